//! Read-only course structure: topics, subtopics and concepts.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::models::ConceptKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtopic {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    /// Extracted source text, handed to generators as context.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subtopics: Vec<Subtopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// A concept together with the names of its parents.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry<'a> {
    pub topic: &'a str,
    pub subtopic: &'a str,
    pub concept: &'a Concept,
}

impl CatalogEntry<'_> {
    pub fn key(&self) -> ConceptKey {
        ConceptKey::new(self.topic, self.subtopic, &self.concept.name)
    }
}

impl Course {
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let course: Course = serde_json::from_str(raw)?;
        course.validate()?;
        Ok(course)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Rejects blank names and concepts listed twice under the same parents.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for entry in self.concepts() {
            if entry.topic.trim().is_empty()
                || entry.subtopic.trim().is_empty()
                || entry.concept.name.trim().is_empty()
            {
                return Err(CatalogError::Invalid {
                    reason: format!("blank name in {}", entry.key()),
                });
            }
            if !seen.insert(entry.key()) {
                return Err(CatalogError::Invalid {
                    reason: format!("duplicate concept {}", entry.key()),
                });
            }
        }
        Ok(())
    }

    pub fn concepts(&self) -> impl Iterator<Item = CatalogEntry<'_>> + '_ {
        self.topics.iter().flat_map(|topic| {
            topic.subtopics.iter().flat_map(move |subtopic| {
                subtopic.concepts.iter().map(move |concept| CatalogEntry {
                    topic: topic.name.as_str(),
                    subtopic: subtopic.name.as_str(),
                    concept,
                })
            })
        })
    }

    pub fn concept_count(&self) -> usize {
        self.concepts().count()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts().next().is_none()
    }

    pub fn keys(&self) -> Vec<ConceptKey> {
        self.concepts().map(|entry| entry.key()).collect()
    }

    pub fn find(&self, key: &ConceptKey) -> Option<&Concept> {
        self.topics
            .iter()
            .find(|topic| topic.name == key.topic)?
            .subtopics
            .iter()
            .find(|subtopic| subtopic.name == key.subtopic)?
            .concepts
            .iter()
            .find(|concept| concept.name == key.concept)
    }

    pub fn subtopic_content(&self, key: &ConceptKey) -> Option<&str> {
        self.topics
            .iter()
            .find(|topic| topic.name == key.topic)?
            .subtopics
            .iter()
            .find(|subtopic| subtopic.name == key.subtopic)?
            .content
            .as_deref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn concept(name: &str) -> Concept {
        Concept {
            name: name.to_string(),
            description: format!("About {name}"),
            keywords: vec![name.to_lowercase()],
        }
    }

    pub(crate) fn python_course() -> Course {
        Course {
            title: "Intro to Python".to_string(),
            description: "First steps".to_string(),
            topics: vec![Topic {
                name: "Python".to_string(),
                description: String::new(),
                subtopics: vec![
                    Subtopic {
                        name: "Control Flow".to_string(),
                        description: String::new(),
                        concepts: vec![concept("Loops"), concept("Conditionals")],
                        content: Some("for and while loops".to_string()),
                    },
                    Subtopic {
                        name: "Data".to_string(),
                        description: String::new(),
                        concepts: vec![concept("Lists"), concept("Dicts"), concept("Tuples")],
                        content: None,
                    },
                ],
            }],
        }
    }

    #[test]
    fn flattens_in_catalog_order() {
        let course = python_course();
        let names: Vec<&str> = course.concepts().map(|e| e.concept.name.as_str()).collect();
        assert_eq!(names, ["Loops", "Conditionals", "Lists", "Dicts", "Tuples"]);
        assert_eq!(course.concept_count(), 5);
        assert!(!course.is_empty());
    }

    #[test]
    fn finds_by_structured_key() {
        let course = python_course();
        let key = ConceptKey::new("Python", "Data", "Dicts");
        assert_eq!(course.find(&key).map(|c| c.name.as_str()), Some("Dicts"));
        assert!(course.find(&ConceptKey::new("Python", "Control Flow", "Dicts")).is_none());
        assert_eq!(
            course.subtopic_content(&ConceptKey::new("Python", "Control Flow", "Loops")),
            Some("for and while loops")
        );
    }

    #[test]
    fn topics_without_concepts_are_empty() {
        let course = Course::from_json_str(
            r#"{"title": "Empty", "topics": [{"name": "T", "subtopics": [{"name": "S"}]}]}"#,
        )
        .unwrap();
        assert!(course.is_empty());
    }

    #[test]
    fn rejects_duplicate_concepts() {
        let raw = r#"{
            "title": "Dup",
            "topics": [{"name": "T", "subtopics": [{"name": "S", "concepts": [
                {"name": "A"}, {"name": "A"}
            ]}]}]
        }"#;
        let err = Course::from_json_str(raw).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { .. }));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("course.json");
        std::fs::write(&path, serde_json::to_string(&python_course()).unwrap()).unwrap();
        let course = Course::load(&path).unwrap();
        assert_eq!(course, python_course());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Course::load(Path::new("/nonexistent/course.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/course.json"));
    }
}
