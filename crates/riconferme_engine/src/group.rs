use crate::client::Wiki;

/// The three wikis a run talks to, each with its own session.
#[derive(Debug)]
pub struct WikiGroup {
    /// The wiki whose administrators are reconfirmed.
    pub main: Wiki,
    /// Where flag removals are requested and checkuser rights are logged.
    pub central: Wiki,
    /// Where run logs are written.
    pub private: Wiki,
}

impl WikiGroup {
    pub fn new(main: Wiki, central: Wiki, private: Wiki) -> Self {
        Self {
            main,
            central,
            private,
        }
    }
}
