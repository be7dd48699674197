//! Final structural check on an accepted label.

use super::labeler::LabelPrediction;
use crate::domain::{CriticVerdict, LabelingError, ValidatedLabel, WorkItem};

/// Turn an accepted prediction into a `ValidatedLabel`.
///
/// Closed-vocabulary labels are normalised to their canonical spelling.
pub fn validate(
    item: &WorkItem,
    prediction: &LabelPrediction,
    verdict: &CriticVerdict,
) -> Result<ValidatedLabel, LabelingError> {
    if !verdict.passes() {
        return Err(LabelingError::Validation(format!(
            "critic verdict does not pass (confidence {} < {})",
            verdict.confidence, verdict.threshold
        )));
    }
    if prediction.confidence < verdict.threshold {
        return Err(LabelingError::Validation(format!(
            "labeler confidence {} is below the required {}",
            prediction.confidence, verdict.threshold
        )));
    }
    let label = prediction.label.trim();
    if label.is_empty() {
        return Err(LabelingError::Validation("label is empty".into()));
    }
    if prediction.confidence > 100 || verdict.confidence > 100 {
        return Err(LabelingError::Validation(
            "confidence outside 0..=100".into(),
        ));
    }

    let label = match item.task_type.allowed_labels() {
        Some(allowed) => allowed
            .iter()
            .find(|l| l.eq_ignore_ascii_case(label))
            .map(|l| l.to_string())
            .ok_or_else(|| {
                LabelingError::Validation(format!(
                    "'{}' is not a valid {} label (expected one of {})",
                    label,
                    item.task_type,
                    allowed.join(", ")
                ))
            })?,
        None => label.to_string(),
    };

    Ok(ValidatedLabel {
        item_id: item.id.clone(),
        label,
        confidence: prediction.confidence,
        rationale: prediction.rationale.clone(),
        critic_confidence: verdict.confidence,
        final_confidence: ValidatedLabel::combined_confidence(
            prediction.confidence,
            verdict.confidence,
        ),
        retry_count: item.retry_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decision, TaskType};

    fn accept(confidence: u8) -> CriticVerdict {
        CriticVerdict {
            decision: Decision::Accept,
            confidence,
            feedback: None,
            threshold: 85,
        }
    }

    fn prediction(label: &str) -> LabelPrediction {
        LabelPrediction {
            label: label.into(),
            confidence: 88,
            rationale: "r".into(),
        }
    }

    #[test]
    fn test_validate_normalises_closed_vocabulary() {
        let item = WorkItem::new("1", "great", TaskType::Sentiment);
        let label = validate(&item, &prediction("positive"), &accept(90)).unwrap();
        assert_eq!(label.label, "POSITIVE");
        assert_eq!(label.final_confidence, 89);
        assert_eq!(label.retry_count, 0);
    }

    #[test]
    fn test_validate_rejects_out_of_vocabulary() {
        let item = WorkItem::new("1", "great", TaskType::Sentiment);
        let err = validate(&item, &prediction("HAPPY"), &accept(90)).unwrap_err();
        assert!(matches!(err, LabelingError::Validation(_)));
    }

    #[test]
    fn test_validate_free_form_task() {
        let item = WorkItem::new("1", "sky?", TaskType::VisualQa);
        let label = validate(&item, &prediction("blue"), &accept(95)).unwrap();
        assert_eq!(label.label, "blue");
    }

    #[test]
    fn test_validate_requires_passing_verdict() {
        let item = WorkItem::new("1", "great", TaskType::Sentiment);
        assert!(validate(&item, &prediction("POSITIVE"), &accept(84)).is_err());
    }

    #[test]
    fn test_validate_rejects_unsure_labeler() {
        let item = WorkItem::new("1", "great", TaskType::Sentiment);
        let unsure = LabelPrediction {
            confidence: 10,
            ..prediction("POSITIVE")
        };
        let err = validate(&item, &unsure, &accept(90)).unwrap_err();
        assert!(matches!(err, LabelingError::Validation(_)));
        assert!(err.to_string().contains("labeler confidence 10"));
    }
}
