//! Unit tests for source classification

use otk::classify::{ClassificationRule, ProcessingVariant, ResponseClassifier};

#[test]
fn well_known_families_are_classified() {
    let classifier = ResponseClassifier::with_defaults();
    assert_eq!(classifier.classify("deepseek-r1:14b"), ProcessingVariant::Reasoning);
    assert_eq!(classifier.classify("qwen3:8b"), ProcessingVariant::Reasoning);
    assert_eq!(classifier.classify("codellama:7b"), ProcessingVariant::Code);
    assert_eq!(classifier.classify("llama3"), ProcessingVariant::Standard);
}

#[test]
fn matching_ignores_case() {
    let classifier = ResponseClassifier::with_defaults();
    assert_eq!(classifier.classify("DeepSeek-R1"), ProcessingVariant::Reasoning);
    assert_eq!(classifier.classify("CodeLlama"), ProcessingVariant::Code);
}

#[test]
fn empty_source_is_standard() {
    assert_eq!(
        ResponseClassifier::with_defaults().classify(""),
        ProcessingVariant::Standard
    );
}

#[test]
fn first_registered_rule_wins() {
    let mut classifier = ResponseClassifier::new();
    classifier.register_rule("coder", ProcessingVariant::Code);
    classifier.register_rule("deep", ProcessingVariant::Reasoning);
    assert_eq!(classifier.classify("deepcoder"), ProcessingVariant::Code);
}

#[test]
fn registered_rules_extend_defaults() {
    let mut classifier = ResponseClassifier::with_defaults();
    let before = classifier.rules().len();
    classifier.register_rule("Mistral", ProcessingVariant::Custom);
    assert_eq!(classifier.rules().len(), before + 1);
    assert_eq!(classifier.classify("mistral:7b"), ProcessingVariant::Custom);
}

#[test]
fn rule_tokens_are_lowercased() {
    let rule = ClassificationRule::new("QwQ", ProcessingVariant::Reasoning);
    assert_eq!(rule.token, "qwq");
}

#[test]
fn variant_names_parse_back() {
    for variant in ProcessingVariant::all() {
        assert_eq!(variant.as_str().parse::<ProcessingVariant>().unwrap(), *variant);
    }
    assert!("bogus".parse::<ProcessingVariant>().is_err());
}
