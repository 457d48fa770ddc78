use crate::request::Params;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditContent {
    Replace(String),
    Append(String),
    Prepend(String),
}

/// Parameters of one `action=edit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditParams {
    pub title: String,
    pub content: EditContent,
    pub summary: String,
    pub section: Option<String>,
    pub section_title: Option<String>,
    pub create_only: bool,
    pub no_create: bool,
}

impl EditParams {
    pub fn replace(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_content(title, EditContent::Replace(text.into()))
    }

    pub fn append(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_content(title, EditContent::Append(text.into()))
    }

    pub fn prepend(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_content(title, EditContent::Prepend(text.into()))
    }

    /// A new section titled `heading` at the bottom of the page.
    pub fn new_section(
        title: impl Into<String>,
        heading: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let mut params = Self::with_content(title, EditContent::Replace(text.into()));
        params.section = Some("new".to_string());
        params.section_title = Some(heading.into());
        params
    }

    fn with_content(title: impl Into<String>, content: EditContent) -> Self {
        Self {
            title: title.into(),
            content,
            summary: String::new(),
            section: None,
            section_title: None,
            create_only: false,
            no_create: false,
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    pub fn no_create(mut self) -> Self {
        self.no_create = true;
        self
    }

    pub(crate) fn to_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("action".into(), "edit".into());
        params.insert("title".into(), self.title.clone());
        let (key, text) = match &self.content {
            EditContent::Replace(text) => ("text", text),
            EditContent::Append(text) => ("appendtext", text),
            EditContent::Prepend(text) => ("prependtext", text),
        };
        params.insert(key.into(), text.clone());
        if !self.summary.is_empty() {
            params.insert("summary".into(), self.summary.clone());
        }
        if let Some(section) = &self.section {
            params.insert("section".into(), section.clone());
        }
        if let Some(heading) = &self.section_title {
            params.insert("sectiontitle".into(), heading.clone());
        }
        if self.create_only {
            params.insert("createonly".into(), "1".into());
        }
        if self.no_create {
            params.insert("nocreate".into(), "1".into());
        }
        params
    }
}
