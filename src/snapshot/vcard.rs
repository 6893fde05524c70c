//! vCard 3.0 rendering.

use crate::contacts::Contact;

/// Render one contact as a vCard block, terminated by a newline.
pub fn render_contact(contact: &Contact) -> String {
    format!(
        "BEGIN:VCARD\nVERSION:3.0\nFN:{}\nTEL;TYPE=CELL:{}\nEND:VCARD\n",
        single_line(&contact.name),
        contact.phone
    )
}

/// Concatenate the blocks of every contact, in the given order.
pub fn render_contacts(contacts: &[Contact]) -> String {
    contacts.iter().map(render_contact).collect()
}

/// Line breaks inside a value would split the block.
fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
