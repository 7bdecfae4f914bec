use std::sync::RwLock;

use core_types::MetadataTemplate;
use engine::TemplateLookup;

/// Named templates, matched against item templates by contents.
#[derive(Debug, Default)]
pub struct TemplateLibrary {
    templates: RwLock<Vec<MetadataTemplate>>,
}

impl TemplateLibrary {
    pub fn new(templates: Vec<MetadataTemplate>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    pub fn replace_all(&self, templates: Vec<MetadataTemplate>) {
        *self.templates.write().expect("template library poisoned") = templates;
    }

    pub fn upsert(&self, template: MetadataTemplate) {
        let mut templates = self.templates.write().expect("template library poisoned");
        match templates.iter_mut().find(|known| known.title == template.title) {
            Some(known) => *known = template,
            None => templates.push(template),
        }
    }

    pub fn len(&self) -> usize {
        self.templates.read().expect("template library poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TemplateLookup for TemplateLibrary {
    fn find_by_contents(&self, template: &MetadataTemplate) -> Option<MetadataTemplate> {
        if template.is_empty() {
            return None;
        }
        self.templates
            .read()
            .expect("template library poisoned")
            .iter()
            .find(|known| known.same_contents(template))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agency() -> MetadataTemplate {
        MetadataTemplate {
            title: "Agency".into(),
            authors: vec!["Kari".into()],
            credit: "ACME".into(),
            ..MetadataTemplate::default()
        }
    }

    #[test]
    fn matches_on_contents_and_restores_title() {
        let library = TemplateLibrary::new(vec![agency()]);
        let raw = MetadataTemplate {
            title: String::new(),
            ..agency()
        };
        assert_eq!(library.find_by_contents(&raw).unwrap().title, "Agency");

        let other = MetadataTemplate {
            credit: "Other".into(),
            ..raw
        };
        assert!(library.find_by_contents(&other).is_none());
        assert!(library
            .find_by_contents(&MetadataTemplate::default())
            .is_none());
    }

    #[test]
    fn upsert_replaces_same_title() {
        let library = TemplateLibrary::default();
        library.upsert(agency());
        library.upsert(MetadataTemplate {
            credit: "ACME Ltd".into(),
            ..agency()
        });
        assert_eq!(library.len(), 1);
    }
}
