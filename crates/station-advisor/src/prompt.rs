//! Instruction template and user message for advice generation.

use serde::Serialize;
use station_weather::trend::{summarize, TrendSummary};

use crate::error::GeneratorError;
use crate::observation::Observation;

pub const SYSTEM_PROMPT: &str = r#"你是一個貼心的家庭智慧管家。你的任務是根據當前的天氣數據，給出一句簡短、溫暖且實用的生活建議。

回應限制：
1. 繁體中文 (台灣用語)。
2. 字數限制：25 字以內 (因為螢幕空間有限)。
3. 語氣：溫暖、像朋友一樣，不要太像機器人。

判斷準則 (優先級由高至低)：
請依照以下順序檢視數據，決定建議的重點：
1. 危險/極端天氣 (如豪大雨、颱風等級強風)：必須優先警告安全。
2. 降雨 (rainProbability > 60% 或 weather 為雨)：提醒帶傘或行車安全。
3. 極端溫度 (體感 < 12°C 或 > 32°C)：提醒保暖或防曬/補水。
4. 溫差 (若當日溫差大)：提醒洋蔥式穿法。
5. 舒適/一般：給予祝賀或心情小語。

重要：請直接回覆建議文字，不要加上「建議：」或其他前綴詞。"#;

const USER_PREFIX: &str = "根據以下天氣數據，給我一句建議：";

#[derive(Serialize)]
struct PromptData<'a> {
    #[serde(flatten)]
    observation: &'a Observation,
    #[serde(skip_serializing_if = "Option::is_none")]
    trend: Option<TrendSummary>,
}

/// User message: the observation (and its trend, when a forecast is present)
/// as indented JSON.
pub fn user_message(observation: &Observation) -> Result<String, GeneratorError> {
    let data = PromptData {
        observation,
        trend: observation.forecast.as_deref().map(summarize),
    };
    let json = serde_json::to_string_pretty(&data)?;
    Ok(format!("{}\n\n{}", USER_PREFIX, json))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use station_weather::WeatherSnapshot;

    #[test]
    fn test_user_message_current_only() {
        let observation = Observation::current_only(WeatherSnapshot {
            temperature: Some(28.0),
            condition: Some("晴時多雲".into()),
            ..WeatherSnapshot::default()
        });

        let message = user_message(&observation).unwrap();
        assert!(message.starts_with(USER_PREFIX));
        assert!(message.contains("\"weather\": \"晴時多雲\""));
        assert!(!message.contains("\"trend\""));
    }

    #[test]
    fn test_user_message_includes_trend() {
        let observation = Observation::new(WeatherSnapshot::default(), Vec::new());
        let message = user_message(&observation).unwrap();
        assert!(message.contains("\"trend\""));
        assert!(message.contains("\"direction\": \"steady\""));
    }
}
