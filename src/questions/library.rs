//! Bundled question library loaded from topic JSON files
//!
//! A topic file is either a bare array of questions (the topic is named after
//! the file) or an object with `id`, `name`, `description` and `questions`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::template::{render, sample_variables, VariableDefinition};
use super::{Question, Topic};

/// Question with optional template variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTemplate {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    #[serde(alias = "correctIndex")]
    pub correct_index: usize,
    #[serde(default, alias = "topicId")]
    pub topic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, VariableDefinition>>,
}

impl From<Question> for QuestionTemplate {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options,
            correct_index: q.correct_index,
            topic_id: q.topic_id,
            variables: None,
        }
    }
}

impl QuestionTemplate {
    /// Produce a concrete question, drawing fresh variable values
    pub fn instantiate<R: Rng>(&self, rng: &mut R) -> Question {
        let Some(variables) = &self.variables else {
            return Question {
                id: self.id.clone(),
                text: self.text.clone(),
                options: self.options.clone(),
                correct_index: self.correct_index,
                topic_id: self.topic_id.clone(),
            };
        };

        let bindings = sample_variables(variables, rng);
        Question {
            id: format!("{}-{}", self.id, instance_suffix(rng)),
            text: render(&self.text, &bindings),
            options: self.options.iter().map(|o| render(o, &bindings)).collect(),
            correct_index: self.correct_index,
            topic_id: self.topic_id.clone(),
        }
    }
}

/// Five lowercase base-36 characters
fn instance_suffix<R: Rng>(rng: &mut R) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    (0..5)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Deserialize)]
struct TopicFile {
    id: Option<String>,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    questions: Vec<QuestionTemplate>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopicFileContent {
    List(Vec<QuestionTemplate>),
    Topic(TopicFile),
}

/// In-memory topic and question catalog
#[derive(Debug, Clone, Default)]
pub struct QuestionLibrary {
    topics: Vec<Topic>,
    questions: HashMap<String, Vec<QuestionTemplate>>,
}

impl QuestionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`, in file name order.
    ///
    /// Unreadable or malformed files are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self, LibraryError> {
        let mut paths: Vec<_> = fs::read_dir(dir)
            .map_err(|e| LibraryError::Io(dir.display().to_string(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut library = Self::new();
        for path in paths {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();

            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read topic file");
                    continue;
                }
            };

            match library.load_str(&stem, &raw) {
                Ok(topic_id) => debug!(path = %path.display(), topic_id, "Loaded topic file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping topic file"),
            }
        }

        info!(
            dir = %dir.display(),
            topics = library.topics.len(),
            "Question library loaded"
        );
        Ok(library)
    }

    /// Parse one topic file's contents. Returns the topic id.
    pub fn load_str(&mut self, file_stem: &str, raw: &str) -> Result<String, LibraryError> {
        let content: TopicFileContent =
            serde_json::from_str(raw).map_err(|e| LibraryError::Parse(file_stem.to_string(), e))?;

        let (topic, questions) = match content {
            TopicFileContent::List(questions) => (
                Topic {
                    id: file_stem.to_string(),
                    name: file_stem.replace('-', " ").to_uppercase(),
                    description: None,
                },
                questions,
            ),
            TopicFileContent::Topic(file) => (
                Topic {
                    id: file.id.unwrap_or_else(|| file_stem.to_string()),
                    name: file.name.unwrap_or_else(|| "Unknown Topic".to_string()),
                    description: file.description,
                },
                file.questions,
            ),
        };

        let topic_id = topic.id.clone();
        self.insert_topic(topic, questions);
        Ok(topic_id)
    }

    /// Add or replace a topic and its questions
    pub fn insert_topic(&mut self, topic: Topic, questions: Vec<QuestionTemplate>) {
        let questions = questions
            .into_iter()
            .map(|mut q| {
                q.topic_id = topic.id.clone();
                q
            })
            .collect();

        self.topics.retain(|t| t.id != topic.id);
        self.questions.insert(topic.id.clone(), questions);
        self.topics.push(topic);
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    /// Up to `count` distinct questions of a topic in random order
    pub fn sample<R: Rng>(&self, topic_id: &str, count: usize, rng: &mut R) -> Vec<Question> {
        let Some(templates) = self.questions.get(topic_id) else {
            return Vec::new();
        };
        templates
            .choose_multiple(rng, count)
            .map(|t| t.instantiate(rng))
            .collect::<Vec<_>>()
    }
}

/// Library loading errors
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Failed to read {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("Malformed topic file {0}: {1}")]
    Parse(String, #[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const ARRAY_TOPIC: &str = r#"[
        { "id": "1", "text": "1 + 1 = ?", "options": ["1", "2", "3", "4"], "correctIndex": 1 },
        { "id": "2", "text": "2 + 3 = ?", "options": ["5", "6", "4", "1"], "correctIndex": 0 }
    ]"#;

    const TEMPLATE_TOPIC: &str = r#"{
        "id": "sums",
        "name": "Sums",
        "description": "Randomized addition",
        "questions": [
            {
                "id": "add",
                "text": "{{a}} + {{b}} = ?",
                "options": ["{{a + b}}", "{{a + b + 1}}", "{{a * b + 100}}"],
                "correctIndex": 0,
                "variables": {
                    "a": { "type": "integer", "min": 1, "max": 9 },
                    "b": { "min": 1, "max": 9 }
                }
            }
        ]
    }"#;

    #[test]
    fn array_file_derives_topic_from_stem() {
        let mut library = QuestionLibrary::new();
        let id = library.load_str("grade-1-math", ARRAY_TOPIC).expect("load");

        assert_eq!(id, "grade-1-math");
        let topic = library.topic("grade-1-math").expect("topic");
        assert_eq!(topic.name, "GRADE 1 MATH");

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let questions = library.sample("grade-1-math", 2, &mut rng);
        assert_eq!(questions.len(), 2);
        assert!(questions.iter().all(|q| q.topic_id == "grade-1-math"));
        // Non-template ids are kept as-is
        let mut ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn template_questions_are_instantiated() {
        let mut library = QuestionLibrary::new();
        library.load_str("ignored-stem", TEMPLATE_TOPIC).expect("load");
        assert!(library.topic("sums").is_some());

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let q = &library.sample("sums", 1, &mut rng)[0];

        assert!(q.id.starts_with("add-"));
        assert_eq!(q.id.len(), "add-".len() + 5);
        assert!(!q.text.contains("{{"));

        let parts: Vec<f64> = q
            .text
            .trim_end_matches(" = ?")
            .split(" + ")
            .map(|p| p.parse().expect("number"))
            .collect();
        let correct: f64 = q.options[q.correct_index].parse().expect("number");
        assert_eq!(correct, parts[0] + parts[1]);
    }

    #[test]
    fn sample_caps_at_available_questions() {
        let mut library = QuestionLibrary::new();
        library.load_str("grade-1-math", ARRAY_TOPIC).expect("load");
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        assert_eq!(library.sample("grade-1-math", 10, &mut rng).len(), 2);
        assert_eq!(library.sample("grade-1-math", 1, &mut rng).len(), 1);
        assert!(library.sample("missing", 3, &mut rng).is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut library = QuestionLibrary::new();
        assert!(matches!(
            library.load_str("bad", "{ not json"),
            Err(LibraryError::Parse(_, _))
        ));
        assert!(library.topics().is_empty());
    }

    #[test]
    fn load_dir_reads_json_files() {
        let dir = std::env::temp_dir().join(format!("tow-library-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("grade-1-math.json"), ARRAY_TOPIC).expect("write");
        fs::write(dir.join("sums.json"), TEMPLATE_TOPIC).expect("write");
        fs::write(dir.join("notes.txt"), "ignored").expect("write");
        fs::write(dir.join("broken.json"), "[").expect("write");

        let library = QuestionLibrary::load_dir(&dir).expect("load dir");
        let ids: Vec<_> = library.topics().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["grade-1-math", "sums"]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn bundled_topics_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/topics");
        let library = QuestionLibrary::load_dir(&dir).expect("load bundled");
        assert_eq!(library.topics().len(), 3);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for topic in library.topics() {
            for q in library.sample(&topic.id, usize::MAX, &mut rng) {
                assert!(q.correct_index < q.options.len(), "{}", q.id);
                assert!(!q.text.contains("{{"), "{}", q.id);
            }
        }
    }
}
