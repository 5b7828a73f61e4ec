//! City domain entity

/// Operating city. Referenced everywhere for scoping, owns nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct City {
    pub id: i32,
    pub name: String,
    /// Unique short tag, e.g. `POZ`.
    pub code: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewCity {
    pub name: String,
    pub code: String,
}

impl NewCity {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}
