//! Specification registry and code resolution.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::prompts::PromptLibrary;
use crate::spec::blank::{BlankSpec, BlankWidth};
use crate::spec::chart::ChartSpec;
use crate::spec::listening::ListeningSpec;
use crate::spec::mcq::{McqFamily, StandardMcqSpec};
use crate::spec::set::SetSpec;
use crate::spec::underline::{JudgmentKind, UnderlineSpec};
use crate::spec::ItemSpec;

/// Numeric-range set codes: RC##_## or RC##-##.
static RE_SET_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RC\d{2}[_-]\d{2}$").unwrap());

/// Maps item-type codes to long-lived specification singletons.
///
/// Built once at startup; immutable and shareable across concurrent
/// requests (specifications carry no per-call mutable state).
pub struct SpecRegistry {
    specs: HashMap<String, Arc<dyn ItemSpec>>,
    listening_default: Arc<dyn ItemSpec>,
    set_default: Arc<dyn ItemSpec>,
    generic: Arc<dyn ItemSpec>,
}

impl SpecRegistry {
    /// The standard registry over a prompt library.
    pub fn standard(prompts: Arc<PromptLibrary>) -> Self {
        let mut specs: HashMap<String, Arc<dyn ItemSpec>> = HashMap::new();

        let mcq = |id: &'static str, family: McqFamily| -> Arc<dyn ItemSpec> {
            Arc::new(StandardMcqSpec::new(id, family, prompts.clone()))
        };

        specs.insert("RC18".into(), mcq("RC18", McqFamily::Purpose));
        specs.insert("RC19".into(), mcq("RC19", McqFamily::Emotion));
        specs.insert("RC20".into(), mcq("RC20", McqFamily::Argument));
        specs.insert("RC21".into(), mcq("RC21", McqFamily::ImplicitMeaning));
        specs.insert("RC22".into(), mcq("RC22", McqFamily::MainPoint));
        specs.insert("RC23".into(), mcq("RC23", McqFamily::Topic));
        specs.insert("RC24".into(), mcq("RC24", McqFamily::Title));
        specs.insert("RC25".into(), Arc::new(ChartSpec::new("RC25", prompts.clone())));
        specs.insert("RC26".into(), mcq("RC26", McqFamily::Biography));
        specs.insert("RC27".into(), mcq("RC27", McqFamily::NoticeTrueFalse));
        specs.insert("RC28".into(), mcq("RC28", McqFamily::NoticeMatch));
        specs.insert(
            "RC29".into(),
            Arc::new(UnderlineSpec::new("RC29", JudgmentKind::Grammar, prompts.clone())),
        );
        specs.insert(
            "RC30".into(),
            Arc::new(UnderlineSpec::new("RC30", JudgmentKind::Lexical, prompts.clone())),
        );
        specs.insert(
            "RC31".into(),
            Arc::new(BlankSpec::new("RC31", BlankWidth::Word, prompts.clone())),
        );
        specs.insert(
            "RC32".into(),
            Arc::new(BlankSpec::new("RC32", BlankWidth::Phrase, prompts.clone())),
        );
        specs.insert(
            "RC33".into(),
            Arc::new(BlankSpec::new("RC33", BlankWidth::Clause, prompts.clone())),
        );
        specs.insert(
            "RC34".into(),
            Arc::new(BlankSpec::new("RC34", BlankWidth::Global, prompts.clone())),
        );
        specs.insert("RC35".into(), mcq("RC35", McqFamily::Irrelevant));
        specs.insert("RC36".into(), mcq("RC36", McqFamily::Ordering));
        specs.insert("RC37".into(), mcq("RC37", McqFamily::Ordering));
        specs.insert("RC38".into(), mcq("RC38", McqFamily::Insertion));
        specs.insert("RC39".into(), mcq("RC39", McqFamily::Insertion));
        specs.insert("RC40".into(), mcq("RC40", McqFamily::Summary));

        let set_41_42: Arc<dyn ItemSpec> =
            Arc::new(SetSpec::new("RC41_42", &[41, 42], prompts.clone()));
        let set_43_45: Arc<dyn ItemSpec> =
            Arc::new(SetSpec::new("RC43_45", &[43, 44, 45], prompts.clone()));
        specs.insert("RC41_42".into(), set_41_42.clone());
        specs.insert("RC43_45".into(), set_43_45.clone());
        // Individual member codes resolve to the shared set spec.
        specs.insert("RC41".into(), set_41_42.clone());
        specs.insert("RC42".into(), set_41_42.clone());
        specs.insert("RC43".into(), set_43_45.clone());
        specs.insert("RC44".into(), set_43_45.clone());
        specs.insert("RC45".into(), set_43_45.clone());

        let listening_default: Arc<dyn ItemSpec> =
            Arc::new(ListeningSpec::new("LC_STANDARD", prompts.clone()));
        for i in 1..=17 {
            specs.insert(format!("LC{i:02}"), listening_default.clone());
        }

        let generic: Arc<dyn ItemSpec> = mcq("RC_GENERIC", McqFamily::Generic);
        specs.insert("RC_GENERIC".into(), generic.clone());

        Self {
            specs,
            listening_default,
            set_default: set_41_42,
            generic,
        }
    }

    /// Register or replace a specification for a code.
    ///
    /// The extension point for new item types: the registry and
    /// orchestrator depend only on the `ItemSpec` trait.
    pub fn with_spec(mut self, code: impl Into<String>, spec: Arc<dyn ItemSpec>) -> Self {
        self.specs.insert(code.into(), spec);
        self
    }

    /// Resolve a code to a specification.
    ///
    /// Order: exact registry hit, LC prefix family, numeric-range set
    /// pattern, generic fallback. Resolution never fails; the returned
    /// string is the resolved item id.
    pub fn resolve(&self, code: &str) -> (String, Arc<dyn ItemSpec>) {
        let code = code.trim().to_uppercase();
        if let Some(spec) = self.specs.get(&code) {
            return (code, spec.clone());
        }
        if code.starts_with("LC") {
            return (code, self.listening_default.clone());
        }
        if RE_SET_RANGE.is_match(&code) {
            return (code, self.set_default.clone());
        }
        ("RC_GENERIC".to_string(), self.generic.clone())
    }

    /// Number of registered codes.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SpecRegistry {
        SpecRegistry::standard(Arc::new(PromptLibrary::builtin()))
    }

    #[test]
    fn test_exact_hit() {
        let (id, spec) = registry().resolve("RC25");
        assert_eq!(id, "RC25");
        assert_eq!(spec.id(), "RC25");
    }

    #[test]
    fn test_case_and_whitespace_normalized() {
        let (id, spec) = registry().resolve("  rc31 ");
        assert_eq!(id, "RC31");
        assert_eq!(spec.id(), "RC31");
    }

    #[test]
    fn test_lc_prefix_family() {
        let (id, spec) = registry().resolve("LC99");
        assert_eq!(id, "LC99");
        assert_eq!(spec.id(), "LC_STANDARD");
    }

    #[test]
    fn test_set_member_resolves_to_shared_set_spec() {
        let (_, spec) = registry().resolve("RC42");
        assert_eq!(spec.id(), "RC41_42");
    }

    #[test]
    fn test_unregistered_range_pattern_maps_to_set() {
        let (id, spec) = registry().resolve("RC46-48");
        assert_eq!(id, "RC46-48");
        assert_eq!(spec.id(), "RC41_42");
    }

    #[test]
    fn test_unknown_code_falls_back_to_generic() {
        let (id, spec) = registry().resolve("SOMETHING_ELSE");
        assert_eq!(id, "RC_GENERIC");
        assert_eq!(spec.id(), "RC_GENERIC");
    }

    #[test]
    fn test_registry_covers_all_published_codes() {
        let registry = registry();
        for i in 18..=45 {
            let code = format!("RC{i}");
            let (_, spec) = registry.resolve(&code);
            assert_ne!(spec.id(), "RC_GENERIC", "{code} fell through to generic");
        }
        assert!(registry.len() > 40);
    }

    #[test]
    fn test_quote_support_flags() {
        let registry = registry();
        assert!(registry.resolve("RC31").1.has_quote_support());
        assert!(registry.resolve("RC29").1.has_quote_support());
        assert!(!registry.resolve("RC22").1.has_quote_support());
        assert!(!registry.resolve("RC41_42").1.has_quote_support());
    }
}
