use std::fmt;

mod packages;
mod pkg_info;

pub use self::packages::find_packages;
pub use self::pkg_info::{MetadataError, PkgInfo};

/// Python's placeholder for fields which were never declared.
const UNKNOWN: &str = "UNKNOWN";

/// A name and email address, as declared for a project's author or maintainer.
#[derive(Clone, Debug, PartialEq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

impl Contact {
    /// Both halves must be declared for the contact to be usable.
    pub fn new(name: &str, email: &str) -> Option<Contact> {
        let name = name.trim().trim_matches('"').trim();
        let email = email.trim();
        if is_declared(name) && is_declared(email) {
            Some(Contact { name: name.to_owned(), email: email.to_owned() })
        } else {
            None
        }
    }

    /// Reads a contact from separate name and email fields. The email field may also hold a
    /// complete `"Name" <email>` address, which is used when the name field is absent.
    pub fn from_fields(name: Option<&str>, email: Option<&str>) -> Option<Contact> {
        let email = email?.split(',').next()?.trim();
        match (email.find('<'), email.rfind('>')) {
            (Some(start), Some(end)) if start < end => {
                let address = &email[start + 1..end];
                match name.filter(|x| is_declared(x)) {
                    Some(name) => Contact::new(name, address),
                    None => Contact::new(&email[..start], address),
                }
            }
            _ => Contact::new(name?, email),
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

fn is_declared(value: &str) -> bool {
    !value.trim().is_empty() && value.trim() != UNKNOWN
}

/// Read-only view of the metadata a Python project declares about itself.
pub trait ProjectMetadata {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn maintainer(&self) -> Option<Contact>;
    fn author(&self) -> Option<Contact>;
    fn description(&self) -> &str;
    fn long_description(&self) -> &str;
    fn has_ext_modules(&self) -> bool;
    /// Importable packages in dotted notation, in declaration order.
    fn packages(&self) -> &[String];
}
