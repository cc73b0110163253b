//! Instruction template the retrieved context and question are substituted into

use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

use sr_core::{Error, Result};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(context|question)\}").expect("placeholder pattern is valid"));

/// Answer in Arabic from the given context, admit when the answer is unknown,
/// send tables whole and suggest three follow-up questions.
pub const DEFAULT_TEMPLATE: &str = "قم بفهم السياقات المقدمة مع كل سؤال ثم بقم بالاجابة على السؤال.
أجب باللغة العربية فقط.

إذا كنت لا تعرف الإجابة، فقط قل إنك لا تعرف، لا تحاول تصنيع إجابة.
سيصلك العديد من Documents لا توجد صلة وصل بينهم إلا إذا كانت الmetadata تحوي نفس ال name
اذا كانت الإجابة من جدول ما أرسله بالكامل
في حال عدم وضوح السؤال استفسر أكثر واقترح أسئلة للتوضيح وفقاََ لفهمك والمعلومات المقدمة.
بعد الإجابة قم باقتراح ثلاث أسئلة من المعلومات المقدمة لك
حافظ على إجابتك شاملة وصحيحة ومختصرة قدر الإمكان.
أضف مقدمة مناسبة تشرح للزبون ماهية سؤاله و ماهية الجواب.
كن لبقا في إجاباتك.

السياق: {context}

السؤال: {question}

الإجابة المفيدة:
";

/// Prompt template with `{context}` and `{question}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        for placeholder in ["{context}", "{question}"] {
            if !text.contains(placeholder) {
                warn!(placeholder, "prompt template has no placeholder");
            }
        }
        Self { text }
    }

    /// Load the template from an external text file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8(bytes).map_err(|_| {
            Error::Configuration(format!(
                "prompt template {} is not valid UTF-8",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), "loaded prompt template");
        Ok(Self::new(text))
    }

    /// Load from `path` when given, otherwise use the built-in template
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => Ok(Self::default()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Substitute both placeholders in a single pass, so placeholder-like
    /// text inside the retrieved context or the question is left as is.
    pub fn render(&self, context: &str, question: &str) -> String {
        PLACEHOLDER
            .replace_all(&self.text, |caps: &Captures| match &caps[1] {
                "context" => context.to_string(),
                _ => question.to_string(),
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_both_placeholders() {
        let template = PromptTemplate::new("C={context}\nQ={question}");
        assert_eq!(template.render("docs", "why?"), "C=docs\nQ=why?");
    }

    #[test]
    fn test_render_does_not_resubstitute_inserted_text() {
        let template = PromptTemplate::new("{context} | {question}");
        let rendered = template.render("see {question}", "literal {context}");
        assert_eq!(rendered, "see {question} | literal {context}");
    }

    #[test]
    fn test_default_template_has_placeholders() {
        let template = PromptTemplate::default();
        assert!(template.as_str().contains("{context}"));
        assert!(template.as_str().contains("{question}"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt_template.txt");
        std::fs::write(&path, "Context: {context}\nQuestion: {question}").unwrap();

        let template = PromptTemplate::load(Some(&path)).await.unwrap();
        assert_eq!(template.render("x", "y"), "Context: x\nQuestion: y");
    }

    #[tokio::test]
    async fn test_non_utf8_template_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, [0xff, 0xfe]).unwrap();

        let err = PromptTemplate::from_file(&path).await.unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
