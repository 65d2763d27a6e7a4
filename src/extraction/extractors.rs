//! Category extractors.
//!
//! Each function reads free-form text and returns one category's findings,
//! empty when nothing matched. Fixed patterns are compiled once; patterns that
//! depend on the vocabulary live in [`VocabularyPatterns`].

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;

use super::recognizer::NamedEntity;
use super::{ExtractionError, LabResult};
use crate::vocabulary::MedicalVocabulary;

const MONTHS: &str = "Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec";

lazy_static! {
    static ref DATE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b\d{1,2}/\d{1,2}/\d{2,4}\b").expect("slash date pattern should be valid"),
        Regex::new(r"(?i)\b\d{1,2}-\d{1,2}-\d{2,4}\b").expect("dash date pattern should be valid"),
        Regex::new(&format!(r"(?i)\b(?:{MONTHS})[a-z]* \d{{1,2}},? \d{{4}}\b"))
            .expect("month-first date pattern should be valid"),
        Regex::new(&format!(r"(?i)\b\d{{1,2}} (?:{MONTHS})[a-z]* \d{{4}}\b"))
            .expect("day-first date pattern should be valid"),
    ];

    // Name parts are joined by spaces or tabs only, so a name never runs
    // into the next line's label.
    static ref DOCTOR_NAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?:Dr\.|Doctor)\s+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,2})")
            .expect("doctor title pattern should be valid"),
        Regex::new(r"(?:Physician|Provider):\s*([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,2})")
            .expect("provider label pattern should be valid"),
    ];

    static ref PHONE_PATTERN: Regex = Regex::new(
        r"(?i)\b(?:Phone|Tel|Contact)(?:\s*number)?[:\s]*(\(\d{3}\)\s*\d{3}-\d{4}|\d{3}[-.\s]\d{3}[-.\s]\d{4}|\d{10})"
    )
    .expect("phone pattern should be valid");

    static ref PATIENT_NAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:Patient|Name):\s*([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,2})")
            .expect("patient name pattern should be valid"),
        Regex::new(r"(?i)\b(?:Patient|Name)[: \t]+([A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+){1,2})")
            .expect("loose patient name pattern should be valid"),
    ];

    static ref DOB_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:DOB|Date of Birth)[:\s]*(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})")
            .expect("DOB pattern should be valid"),
        Regex::new(r"(?i)\b(?:Born|Birth)[:\s]*(\d{1,2}[-/]\d{1,2}[-/]\d{2,4})")
            .expect("birth pattern should be valid"),
    ];

    static ref PATIENT_ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(?:Patient ID|MRN|ID)\b[:\s]*([A-Z0-9-]+)")
            .expect("patient ID pattern should be valid"),
        Regex::new(r"(?i)\bMedical Record Number[:\s]*([A-Z0-9-]+)")
            .expect("record number pattern should be valid"),
    ];

    // Units must start with a letter or '%', which keeps "DOB: 01/02" out.
    static ref LAB_RESULT_PATTERN: Regex =
        Regex::new(r"([A-Za-z][A-Za-z \t]*):[ \t]*(\d+\.?\d*(?:/\d+)?)[ \t]*([A-Za-z%][A-Za-z/%]*)")
            .expect("lab result pattern should be valid");

    static ref INSTRUCTION_PATTERNS: Vec<Regex> = vec![
        Regex::new(
            r"(?i)\b(?:Take|Use|Apply)\b[^.;\n]+(?:daily|twice daily|three times daily|every \d+ hours)[^.;\n]*"
        )
        .expect("instruction phrase pattern should be valid"),
        Regex::new(r"(?i)\bInstructions?:[^.;\n]+").expect("instructions label pattern should be valid"),
        Regex::new(r"(?i)\bDirections?:[^.;\n]+").expect("directions label pattern should be valid"),
    ];

    static ref DIAGNOSIS_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\bDiagnos[ie]s:[^.;\n]+").expect("diagnosis pattern should be valid"),
        Regex::new(r"(?i)\bAssessment:[^.;\n]+").expect("assessment pattern should be valid"),
        Regex::new(r"(?i)\bConditions?:[^.;\n]+").expect("condition pattern should be valid"),
    ];
}

/// Patterns compiled from the medical vocabulary.
#[derive(Debug)]
pub struct VocabularyPatterns {
    medication_names: Vec<(String, Regex)>,
    dosage: Option<Regex>,
    lab_tests: Vec<(String, Regex)>,
    abbreviations: Vec<(String, String, Regex)>,
}

impl VocabularyPatterns {
    pub fn compile(vocabulary: &MedicalVocabulary) -> Result<Self, ExtractionError> {
        let medication_names = vocabulary
            .medications
            .iter()
            .map(|name| Ok((name.clone(), whole_word(name)?)))
            .collect::<Result<Vec<_>, ExtractionError>>()?;

        let dosage = if vocabulary.common_dosages.is_empty() {
            None
        } else {
            let units = vocabulary
                .common_dosages
                .iter()
                .map(|unit| regex::escape(unit))
                .collect::<Vec<_>>()
                .join("|");
            Some(Regex::new(&format!(r"(?i)\b\w+\s+\d+\s*(?:{units})\b"))?)
        };

        let lab_tests = vocabulary
            .lab_test_names
            .iter()
            .map(|name| {
                let pattern = format!(r"(?i){}[:\s]*(\d+\.?\d*)\s*([A-Za-z/%]+)", regex::escape(name));
                Ok((name.clone(), Regex::new(&pattern)?))
            })
            .collect::<Result<Vec<_>, ExtractionError>>()?;

        let abbreviations = vocabulary
            .medical_abbreviations
            .iter()
            .map(|(abbr, full)| Ok((abbr.clone(), full.clone(), whole_word(abbr)?)))
            .collect::<Result<Vec<_>, ExtractionError>>()?;

        Ok(Self {
            medication_names,
            dosage,
            lab_tests,
            abbreviations,
        })
    }
}

fn whole_word(term: &str) -> Result<Regex, ExtractionError> {
    Ok(Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term)))?)
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|pattern| pattern.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn all_matches(patterns: &[Regex], text: &str) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|pattern| pattern.find_iter(text))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Dates in every supported form. Repeats are dropped within a pattern but
/// not across patterns.
pub fn extract_dates(text: &str) -> Vec<String> {
    let mut dates = Vec::new();
    for pattern in DATE_PATTERNS.iter() {
        let mut seen = BTreeSet::new();
        for m in pattern.find_iter(text) {
            if seen.insert(m.as_str()) {
                dates.push(m.as_str().to_string());
            }
        }
    }
    dates
}

/// Patient `name`, `dob` and `id`, each from the first pattern that matches.
pub fn extract_patient_info(text: &str) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    if let Some(name) = first_capture(&PATIENT_NAME_PATTERNS, text) {
        info.insert("name".to_string(), name);
    }
    if let Some(dob) = first_capture(&DOB_PATTERNS, text) {
        info.insert("dob".to_string(), dob);
    }
    if let Some(id) = first_capture(&PATIENT_ID_PATTERNS, text) {
        info.insert("id".to_string(), id);
    }
    info
}

/// Known medication names, dosage phrases and `PRODUCT` entities, as a set.
pub fn extract_medications(text: &str, patterns: &VocabularyPatterns, entities: &[NamedEntity]) -> Vec<String> {
    let mut medications = BTreeSet::new();

    for (name, pattern) in &patterns.medication_names {
        if pattern.is_match(text) {
            medications.insert(name.clone());
        }
    }

    if let Some(dosage) = &patterns.dosage {
        for m in dosage.find_iter(text) {
            medications.insert(m.as_str().to_string());
        }
    }

    for entity in entities.iter().filter(|e| e.label == "PRODUCT") {
        medications.insert(entity.text.clone());
    }

    medications.into_iter().collect()
}

/// Doctor `name` and `phone`.
pub fn extract_doctor_info(text: &str) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    if let Some(name) = first_capture(&DOCTOR_NAME_PATTERNS, text) {
        info.insert("name".to_string(), name);
    }
    if let Some(phone) = PHONE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
    {
        info.insert("phone".to_string(), phone.as_str().to_string());
    }
    info
}

/// Generic `<label>: <number>[/<number>] <unit>` hits followed by known-test hits.
/// Both sources are kept, duplicates included.
pub fn extract_lab_results(text: &str, patterns: &VocabularyPatterns) -> Vec<LabResult> {
    let mut results: Vec<LabResult> = LAB_RESULT_PATTERN
        .captures_iter(text)
        .map(|caps| LabResult {
            test: caps[1].trim().to_string(),
            value: caps[2].to_string(),
            unit: caps[3].to_string(),
        })
        .collect();

    for (name, pattern) in &patterns.lab_tests {
        if let Some(caps) = pattern.captures(text) {
            results.push(LabResult {
                test: name.clone(),
                value: caps[1].to_string(),
                unit: caps[2].to_string(),
            });
        }
    }

    results
}

/// Instruction phrases plus `"<abbr> (<expansion>)"` for every abbreviation
/// found as a whole word.
pub fn extract_instructions(text: &str, patterns: &VocabularyPatterns) -> Vec<String> {
    let mut instructions = all_matches(&INSTRUCTION_PATTERNS, text);

    for (abbr, full, pattern) in &patterns.abbreviations {
        if pattern.is_match(text) {
            instructions.push(format!("{} ({})", abbr, full));
        }
    }

    instructions
}

/// Labeled diagnosis sections plus `DISEASE`/`CONDITION` entities.
pub fn extract_diagnoses(text: &str, entities: &[NamedEntity]) -> Vec<String> {
    let mut diagnoses = all_matches(&DIAGNOSIS_PATTERNS, text);
    diagnoses.extend(
        entities
            .iter()
            .filter(|e| e.label == "DISEASE" || e.label == "CONDITION")
            .map(|e| e.text.clone()),
    );
    diagnoses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> VocabularyPatterns {
        VocabularyPatterns::compile(&MedicalVocabulary::default()).unwrap()
    }

    fn patterns_with(vocabulary: MedicalVocabulary) -> VocabularyPatterns {
        VocabularyPatterns::compile(&vocabulary).unwrap()
    }

    #[test]
    fn test_dates_all_formats() {
        let text = "Seen 03/14/2024, follow-up 4-2-24. Issued March 5, 2024 and 12 Jan 2025.";
        assert_eq!(
            extract_dates(text),
            vec!["03/14/2024", "4-2-24", "March 5, 2024", "12 Jan 2025"]
        );
    }

    #[test]
    fn test_dates_dedupe_within_pattern_only() {
        let text = "01/02/1980 and again 01/02/1980";
        assert_eq!(extract_dates(text), vec!["01/02/1980"]);
    }

    #[test]
    fn test_dates_case_insensitive_month() {
        assert_eq!(extract_dates("DATED JUNE 3 2023"), vec!["JUNE 3 2023"]);
    }

    #[test]
    fn test_patient_info_fields() {
        let text = "Patient: John Smith\nDOB: 01/02/1980\nMRN: AB-12345";
        let info = extract_patient_info(text);
        assert_eq!(info.get("name").map(String::as_str), Some("John Smith"));
        assert_eq!(info.get("dob").map(String::as_str), Some("01/02/1980"));
        assert_eq!(info.get("id").map(String::as_str), Some("AB-12345"));
    }

    #[test]
    fn test_patient_id_needs_whole_word() {
        let info = extract_patient_info("Provider: Jane Doe\nInstructions: rest");
        assert!(!info.contains_key("id"));
    }

    #[test]
    fn test_patient_info_loose_label() {
        let info = extract_patient_info("Name  Maria Lopez Garcia");
        assert_eq!(info.get("name").map(String::as_str), Some("Maria Lopez Garcia"));
    }

    #[test]
    fn test_patient_info_birth_fallback() {
        let info = extract_patient_info("Born 7-4-1976");
        assert_eq!(info.get("dob").map(String::as_str), Some("7-4-1976"));
    }

    #[test]
    fn test_doctor_info() {
        let text = "Dr. Emily Carter\nPhone: (555) 123-4567";
        let info = extract_doctor_info(text);
        assert_eq!(info.get("name").map(String::as_str), Some("Emily Carter"));
        assert_eq!(info.get("phone").map(String::as_str), Some("(555) 123-4567"));
    }

    #[test]
    fn test_doctor_provider_label_and_bare_phone() {
        let text = "Provider: Alan Grant\nContact number: 5551234567";
        let info = extract_doctor_info(text);
        assert_eq!(info.get("name").map(String::as_str), Some("Alan Grant"));
        assert_eq!(info.get("phone").map(String::as_str), Some("5551234567"));
    }

    #[test]
    fn test_doctor_name_is_case_sensitive() {
        assert!(extract_doctor_info("dr. emily carter").is_empty());
    }

    #[test]
    fn test_medications_dosage_and_vocabulary() {
        let vocabulary = MedicalVocabulary {
            medications: vec!["Metformin".to_string()],
            ..MedicalVocabulary::default()
        };
        let text = "Take Lisinopril 10 mg daily. metformin 500 mg with meals";

        let meds = extract_medications(text, &patterns_with(vocabulary), &[]);

        assert!(meds.contains(&"Lisinopril 10 mg".to_string()));
        assert!(meds.contains(&"Metformin".to_string()));
        assert!(meds.contains(&"metformin 500 mg".to_string()));
    }

    #[test]
    fn test_medications_deduplicated() {
        let meds = extract_medications("Aspirin 81 mg\nAspirin 81 mg", &patterns(), &[]);
        assert_eq!(meds, vec!["Aspirin 81 mg"]);
    }

    #[test]
    fn test_medications_without_dosage_units() {
        let vocabulary = MedicalVocabulary {
            common_dosages: Vec::new(),
            ..MedicalVocabulary::default()
        };
        let meds = extract_medications("Aspirin 81 mg", &patterns_with(vocabulary), &[]);
        assert!(meds.is_empty());
    }

    #[test]
    fn test_medications_include_product_entities_only() {
        let entities = vec![
            NamedEntity::new("Tylenol", "PRODUCT"),
            NamedEntity::new("asthma", "DISEASE"),
        ];
        let meds = extract_medications("nothing dosed here", &patterns(), &entities);
        assert_eq!(meds, vec!["Tylenol"]);
    }

    #[test]
    fn test_lab_results_generic() {
        let results = extract_lab_results("Glucose: 95 mg/dL\nHemoglobin: 13.2 g/dL", &patterns());
        assert_eq!(
            results,
            vec![
                LabResult {
                    test: "Glucose".to_string(),
                    value: "95".to_string(),
                    unit: "mg/dL".to_string(),
                },
                LabResult {
                    test: "Hemoglobin".to_string(),
                    value: "13.2".to_string(),
                    unit: "g/dL".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_lab_results_ignore_dates() {
        assert!(extract_lab_results("DOB: 01/02/1980", &patterns()).is_empty());
    }

    #[test]
    fn test_lab_results_paired_value() {
        let results = extract_lab_results("BP: 120/80 mmHg\nPulse: 72 bpm", &patterns());
        assert_eq!(results.len(), 2);
        assert_eq!(
            (results[0].test.as_str(), results[0].value.as_str(), results[0].unit.as_str()),
            ("BP", "120/80", "mmHg")
        );
        assert_eq!(results[1].value, "72");
    }

    #[test]
    fn test_lab_results_known_names_duplicate() {
        let vocabulary = MedicalVocabulary {
            lab_test_names: vec!["TSH".to_string()],
            ..MedicalVocabulary::default()
        };
        let results = extract_lab_results("TSH: 2.5 mIU/L", &patterns_with(vocabulary));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_lab_results_known_name_without_colon() {
        let vocabulary = MedicalVocabulary {
            lab_test_names: vec!["Sodium".to_string()],
            ..MedicalVocabulary::default()
        };
        let results = extract_lab_results("sodium 140 mmol/L", &patterns_with(vocabulary));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].test, "Sodium");
        assert_eq!(results[0].value, "140");
        assert_eq!(results[0].unit, "mmol/L");
    }

    #[test]
    fn test_instructions_phrases_and_labels() {
        let text = "Take Lisinopril 10 mg daily\nInstructions: take with food\nDirections: avoid alcohol";
        let instructions = extract_instructions(text, &patterns());
        assert_eq!(
            instructions,
            vec![
                "Take Lisinopril 10 mg daily",
                "Instructions: take with food",
                "Directions: avoid alcohol",
            ]
        );
    }

    #[test]
    fn test_instructions_every_n_hours() {
        let instructions = extract_instructions("Use inhaler every 4 hours as needed.", &patterns());
        assert_eq!(instructions, vec!["Use inhaler every 4 hours as needed"]);
    }

    #[test]
    fn test_instructions_expand_abbreviations() {
        let instructions = extract_instructions("Amoxicillin 500 mg PO BID", &patterns());
        assert!(instructions.contains(&"bid (twice daily)".to_string()));
        assert!(instructions.contains(&"po (by mouth)".to_string()));
        assert!(!instructions.iter().any(|i| i.starts_with("im ")));
    }

    #[test]
    fn test_diagnoses_sections_and_entities() {
        let text = "Diagnosis: Type 2 diabetes\nAssessment: stable; Conditions: hypertension";
        let entities = vec![
            NamedEntity::new("asthma", "DISEASE"),
            NamedEntity::new("obesity", "CONDITION"),
            NamedEntity::new("Advil", "PRODUCT"),
        ];

        let diagnoses = extract_diagnoses(text, &entities);

        assert_eq!(
            diagnoses,
            vec![
                "Diagnosis: Type 2 diabetes",
                "Assessment: stable",
                "Conditions: hypertension",
                "asthma",
                "obesity",
            ]
        );
    }

    #[test]
    fn test_diagnoses_plural_label() {
        let diagnoses = extract_diagnoses("Diagnoses: CHF, CKD stage 3", &[]);
        assert_eq!(diagnoses, vec!["Diagnoses: CHF, CKD stage 3"]);
    }
}
