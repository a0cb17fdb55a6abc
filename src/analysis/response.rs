use super::{
    dto::{ChatCompletionResponse, FoodAnalysis},
    errors::AnalysisError,
};

/// Decode a raw 2xx response body into a nutrition record.
pub fn decode_body(body: &str) -> Result<FoodAnalysis, AnalysisError> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisError::MalformedPayload(format!("invalid completion envelope: {e}")))?;
    decode_completion(&response)
}

/// Take the first completion's text and decode it as `FoodAnalysis`, verbatim.
pub fn decode_completion(response: &ChatCompletionResponse) -> Result<FoodAnalysis, AnalysisError> {
    let text = first_message_text(response).ok_or(AnalysisError::EmptyResponse)?;
    serde_json::from_str::<FoodAnalysis>(text)
        .map_err(|e| AnalysisError::MalformedPayload(e.to_string()))
}

fn first_message_text(response: &ChatCompletionResponse) -> Option<&str> {
    response
        .choices
        .first()?
        .message
        .as_ref()?
        .content
        .as_deref()
        .filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const APPLE: &str = r#"{"dishName":"Apple","calories":52,"proteins":0.3,"fats":0.2,"carbs":14.0,"description":"A fresh apple","aiTip":"An apple a day keeps the doctor away"}"#;

    fn envelope(content: &str) -> String {
        json!({ "choices": [ { "message": { "content": content } } ] }).to_string()
    }

    #[test]
    fn decodes_happy_path() {
        let analysis = decode_body(&envelope(APPLE)).expect("decodes");
        assert_eq!(analysis.dish_name, "Apple");
        assert_eq!(analysis.calories, 52);
        assert_eq!(analysis.proteins, 0.3);
        assert_eq!(analysis.fats, 0.2);
        assert_eq!(analysis.carbs, 14.0);
        assert_eq!(analysis.description, "A fresh apple");
    }

    #[test]
    fn only_the_first_choice_counts() {
        let body = json!({ "choices": [
            { "message": { "content": APPLE } },
            { "message": { "content": "not json" } }
        ] })
        .to_string();
        assert!(decode_body(&body).is_ok());
    }

    #[test]
    fn missing_completion_is_empty_response() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{}"#,
            r#"{"choices":[{}]}"#,
            r#"{"choices":[{"message":{}}]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"message":{"content":"   "}}]}"#,
        ] {
            assert_eq!(decode_body(body), Err(AnalysisError::EmptyResponse), "{body}");
        }
    }

    #[test]
    fn non_json_content_is_malformed() {
        let err = decode_body(&envelope("Sure! Here is the estimate: 52 kcal")).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedPayload(_)));
    }

    #[test]
    fn missing_field_is_malformed() {
        let content = r#"{"dishName":"Apple","calories":52,"proteins":0.3,"fats":0.2,"carbs":14.0,"description":"x"}"#;
        let err = decode_body(&envelope(content)).unwrap_err();
        match err {
            AnalysisError::MalformedPayload(msg) => assert!(msg.contains("aiTip"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_types_are_malformed() {
        let content = r#"{"dishName":"Apple","calories":"52","proteins":0.3,"fats":0.2,"carbs":14.0,"description":"","aiTip":""}"#;
        assert!(matches!(
            decode_body(&envelope(content)),
            Err(AnalysisError::MalformedPayload(_))
        ));
        let fractional = r#"{"dishName":"Apple","calories":52.5,"proteins":0.3,"fats":0.2,"carbs":14.0,"description":"","aiTip":""}"#;
        assert!(matches!(
            decode_body(&envelope(fractional)),
            Err(AnalysisError::MalformedPayload(_))
        ));
    }

    #[test]
    fn broken_envelope_is_malformed() {
        assert!(matches!(
            decode_body("<html>gateway</html>"),
            Err(AnalysisError::MalformedPayload(_))
        ));
    }

    #[test]
    fn zero_values_pass_through_unchanged() {
        let content = r#"{"dishName":"Не еда","calories":0,"proteins":0,"fats":0,"carbs":0,"description":"На фото кошка","aiTip":""}"#;
        let analysis = decode_body(&envelope(content)).unwrap();
        assert_eq!(analysis.calories, 0);
        assert_eq!(analysis.proteins, 0.0);
        assert_eq!(analysis.description, "На фото кошка");
    }

    #[test]
    fn encoded_records_decode_back_identically() {
        let records = [
            FoodAnalysis {
                dish_name: "Борщ".into(),
                calories: 245,
                proteins: 11.7,
                fats: 9.25,
                carbs: 27.001,
                description: "Свекла, капуста, говядина".into(),
                ai_tip: "Добавьте зелень".into(),
            },
            FoodAnalysis {
                dish_name: String::new(),
                calories: 0,
                proteins: 0.0,
                fats: 1e-7,
                carbs: 123456.789,
                description: String::new(),
                ai_tip: "\"quoted\"\n".into(),
            },
        ];
        for record in records {
            let content = serde_json::to_string(&record).unwrap();
            assert_eq!(decode_body(&envelope(&content)).unwrap(), record);
        }
    }
}
