use base64ct::{Base64, Encoding};

use super::dto::{ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, ResponseFormat};
use crate::config::{GroqConfig, DEFAULT_TEXT_MODEL, DEFAULT_VISION_MODEL};

pub const TEMPERATURE: f64 = 0.1;
pub const IMAGE_MIME: &str = "image/jpeg";

/// Task description plus the output contract for the `FoodAnalysis` schema.
pub const SYSTEM_PROMPT: &str = r#"Ты — NutriSnap, эксперт-диетолог. Оцени блюдо по фотографии или текстовому описанию и посчитай калорийность и макронутриенты.

Ответ — ровно один JSON-объект по схеме FoodAnalysis, без текста вокруг:
{
  "dishName": "Название блюда",
  "calories": 0,
  "proteins": 0.0,
  "fats": 0.0,
  "carbs": 0.0,
  "description": "Кратко об ингредиентах",
  "aiTip": "Совет по этому приему пищи"
}

calories — целое число ккал, proteins/fats/carbs — граммы.
Все текстовые поля пиши только на русском языке.
Если на изображении нет еды, не возвращай ошибку: поставь 0 во всех числовых полях и объясни это в поле description."#;

const USER_NOTE_PREFIX: &str = "Пользователь добавил описание:";

/// Which model serves which kind of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub text_model: String,
    pub vision_model: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.into(),
            vision_model: DEFAULT_VISION_MODEL.into(),
        }
    }
}

impl From<&GroqConfig> for ModelSelection {
    fn from(cfg: &GroqConfig) -> Self {
        Self {
            text_model: cfg.text_model.clone(),
            vision_model: cfg.vision_model.clone(),
        }
    }
}

impl ModelSelection {
    pub fn for_input(&self, has_image: bool) -> &str {
        if has_image {
            &self.vision_model
        } else {
            &self.text_model
        }
    }
}

/// Compose the chat request for a meal. Pure; never fails.
pub fn build_request(
    text: Option<&str>,
    image: Option<&[u8]>,
    models: &ModelSelection,
) -> ChatCompletionRequest {
    let prompt = match text.filter(|t| !t.trim().is_empty()) {
        Some(note) => format!("{SYSTEM_PROMPT}\n\n{USER_NOTE_PREFIX} {note}"),
        None => SYSTEM_PROMPT.to_owned(),
    };

    let mut content = vec![ContentPart::Text { text: prompt }];
    if let Some(bytes) = image {
        content.push(ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: image_data_uri(bytes),
            },
        });
    }

    ChatCompletionRequest {
        model: models.for_input(image.is_some()).to_owned(),
        messages: vec![ChatMessage {
            role: "user".into(),
            content,
        }],
        temperature: TEMPERATURE,
        response_format: ResponseFormat::json_object(),
    }
}

fn image_data_uri(bytes: &[u8]) -> String {
    format!("data:{IMAGE_MIME};base64,{}", Base64::encode_string(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_of(req: &ChatCompletionRequest) -> &str {
        match &req.messages[0].content[0] {
            ContentPart::Text { text } => text,
            other => panic!("expected text part, got {:?}", other),
        }
    }

    #[test]
    fn image_input_routes_to_vision_model() {
        let models = ModelSelection::default();
        for text in [None, Some(""), Some("борщ со сметаной")] {
            let req = build_request(text, Some(&[0xff, 0xd8, 0xff][..]), &models);
            assert_eq!(req.model, DEFAULT_VISION_MODEL);
        }
        let req = build_request(None, Some(&[0u8; 0][..]), &models);
        assert_eq!(req.model, DEFAULT_VISION_MODEL);
    }

    #[test]
    fn text_only_routes_to_text_model() {
        let models = ModelSelection::default();
        for text in [None, Some(""), Some("apple"), Some("фото тарелки с пастой")] {
            let req = build_request(text, None, &models);
            assert_eq!(req.model, DEFAULT_TEXT_MODEL);
            assert_eq!(req.messages[0].content.len(), 1);
        }
    }

    #[test]
    fn custom_models_are_honoured() {
        let models = ModelSelection {
            text_model: "small".into(),
            vision_model: "seeing".into(),
        };
        assert_eq!(build_request(Some("x"), None, &models).model, "small");
        assert_eq!(build_request(None, Some(&b"x"[..]), &models).model, "seeing");
    }

    #[test]
    fn user_text_is_appended_after_prompt() {
        let req = build_request(Some("apple"), None, &ModelSelection::default());
        let text = text_of(&req);
        assert!(text.starts_with(SYSTEM_PROMPT));
        assert!(text.ends_with("Пользователь добавил описание: apple"));
    }

    #[test]
    fn user_text_is_appended_verbatim() {
        let req = build_request(Some("  two eggs\n and toast "), None, &ModelSelection::default());
        assert!(text_of(&req).ends_with("Пользователь добавил описание:   two eggs\n and toast "));
    }

    #[test]
    fn blank_text_leaves_prompt_alone() {
        let req = build_request(Some(" \n\t"), None, &ModelSelection::default());
        assert_eq!(text_of(&req), SYSTEM_PROMPT);
        let req = build_request(None, None, &ModelSelection::default());
        assert_eq!(text_of(&req), SYSTEM_PROMPT);
    }

    #[test]
    fn wire_shape_matches_chat_completions() {
        let req = build_request(Some("apple"), Some(&b"hi"[..]), &ModelSelection::default());
        let value = serde_json::to_value(&req).unwrap();

        assert_eq!(value["temperature"], json!(0.1));
        assert_eq!(value["response_format"], json!({ "type": "json_object" }));
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert_eq!(
            value["messages"][0]["content"][1],
            json!({ "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,aGk=" } })
        );
    }
}
