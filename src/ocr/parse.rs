use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use super::{TextLine, Word};
use crate::error::PipelineError;

const SERVICE: &str = "ocr";

/// Parses an OCR.space `parse/image` response body.
///
/// A response without `ParsedResults` (or without overlay lines) means no
/// text was found and yields an empty vector. Lines without words are
/// dropped. Only a body that is not a JSON object of the expected shape is an
/// error.
pub fn parse_response(body: &str) -> Result<Vec<TextLine>, PipelineError> {
    let payload: OcrSpaceResponse =
        serde_json::from_str(body).map_err(|err| PipelineError::malformed(SERVICE, err))?;

    if payload.is_errored_on_processing {
        warn!(
            "ocr service reported a processing error: {}",
            error_message(payload.error_message.as_ref()).unwrap_or_else(|| "unknown".into())
        );
    }

    let Some(results) = payload.parsed_results else {
        debug!("ocr response has no ParsedResults");
        return Ok(Vec::new());
    };

    let mut lines = Vec::new();
    for result in results {
        let Some(overlay) = result.text_overlay else {
            continue;
        };
        for line in overlay.lines.unwrap_or_default() {
            if line.words.is_empty() {
                debug!("dropping ocr line without words: {:?}", line.line_text);
                continue;
            }
            let words = line
                .words
                .into_iter()
                .map(|word| Word {
                    text: word.word_text,
                    left: word.left,
                    top: word.top,
                    width: word.width,
                    height: word.height,
                })
                .collect();
            lines.push(TextLine {
                text: line.line_text,
                words,
            });
        }
    }
    Ok(lines)
}

fn error_message(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Array(items) => {
            let parts = items
                .iter()
                .filter_map(|item| item.as_str())
                .collect::<Vec<_>>();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}

fn pixel<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.round() as i32)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    text_overlay: Option<TextOverlay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TextOverlay {
    lines: Option<Vec<OverlayLine>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OverlayLine {
    #[serde(default)]
    line_text: String,
    #[serde(default)]
    words: Vec<OverlayWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OverlayWord {
    #[serde(default)]
    word_text: String,
    #[serde(deserialize_with = "pixel")]
    left: i32,
    #[serde(deserialize_with = "pixel")]
    top: i32,
    #[serde(deserialize_with = "pixel")]
    width: i32,
    #[serde(deserialize_with = "pixel")]
    height: i32,
}

#[cfg(test)]
mod tests {
    use super::parse_response;
    use crate::error::PipelineError;
    use crate::ocr::Word;

    #[test]
    fn response_without_results_is_empty_not_an_error() {
        let lines = parse_response(r#"{"OCRExitCode": 1, "IsErroredOnProcessing": false}"#)
            .expect("missing ParsedResults is valid");
        assert!(lines.is_empty());
    }

    #[test]
    fn errored_processing_without_results_is_empty() {
        let body = r#"{"IsErroredOnProcessing": true, "ErrorMessage": ["File failed validation"]}"#;
        assert!(parse_response(body).expect("degrades").is_empty());
    }

    #[test]
    fn result_without_overlay_is_empty() {
        let body = r#"{"ParsedResults": [{"ParsedText": "Panthera leo"}]}"#;
        assert!(parse_response(body).expect("no overlay").is_empty());
    }

    #[test]
    fn non_json_body_is_malformed() {
        let err = parse_response("<html>502</html>").expect_err("not json");
        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
    }

    #[test]
    fn fixture_lines_keep_order_and_drop_wordless_lines() {
        let body = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/ocr_space_response.json"
        ));
        let lines = parse_response(body).expect("fixture parses");
        let texts = lines.iter().map(|line| line.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Panthera leo", "Felis catus", "Canis lupus"]);
        assert!(lines.iter().all(|line| !line.words.is_empty()));
        assert_eq!(
            lines[0].words,
            vec![
                Word::new("Panthera", 612, 88, 61, 13),
                Word::new("leo", 678, 88, 22, 13),
            ]
        );
    }

    #[test]
    fn fractional_coordinates_are_rounded() {
        let body = r#"{"ParsedResults": [{"TextOverlay": {"Lines": [
            {"LineText": "Mus musculus", "Words": [
                {"WordText": "Mus", "Left": 10.4, "Top": 5.6, "Width": 20.0, "Height": 8.49}
            ]}
        ]}}]}"#;
        let lines = parse_response(body).expect("parses");
        assert_eq!(lines[0].words[0], Word::new("Mus", 10, 6, 20, 8));
    }
}
