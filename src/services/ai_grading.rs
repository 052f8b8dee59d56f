use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::core::config::Settings;
use crate::services::collaborators::{FeedbackRequest, FeedbackWriter, GradeRequest, GradingModel};

const GRADING_SYSTEM_PROMPT: &str = r#"You are an experienced teacher grading a student's worksheet.
You receive the text extracted from the worksheet by OCR, the subject, the grade level and,
optionally, a rubric and extra instructions from the teacher.

Grade every question you can identify. Be fair, be specific and award partial credit.
If the text is unreadable, return zero points and explain why in "summary".

Respond with strict JSON only:
{
  "totalPoints": <number, points possible>,
  "totalPointsEarned": <number, points earned>,
  "questions": [
    {
      "question": "short restatement",
      "studentAnswer": "what the student wrote",
      "score": <number>,
      "maxScore": <number>,
      "correct": <true|false>,
      "comment": "why"
    }
  ],
  "commonErrors": ["short tag for each kind of mistake, e.g. sign error"],
  "strengths": ["..."],
  "summary": "one paragraph"
}
"#;

const FEEDBACK_SYSTEM_PROMPT: &str = r#"You write short, personal feedback for a student about a graded worksheet.
Address the student by name, mention one or two things done well and the most important
thing to practice next. Plain text, at most 120 words, no markdown."#;

#[derive(Debug, Clone)]
pub(crate) struct AiGradingService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl AiGradingService {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().openai_api_key.clone(),
            base_url: settings.ai().openai_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
            max_tokens: settings.ai().ai_max_tokens,
            temperature: settings.ai().ai_temperature,
        })
    }

    /// Single chat completion. No retries: a failed call fails the stage.
    async fn complete(&self, system: &str, user: String, json_mode: bool) -> Result<String> {
        let mut payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if json_mode {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let timer = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call OpenAI API")?;

        let status = response.status();
        let body: Value = response.json().await.context("Failed to read OpenAI response")?;
        if !status.is_success() {
            anyhow::bail!("OpenAI API error (status {status}): {}", error_message(&body));
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .context("Missing OpenAI response content")?;

        let tokens_used = body
            .get("usage")
            .and_then(|usage| usage.get("total_tokens"))
            .and_then(Value::as_u64);
        tracing::debug!(
            model = %self.model,
            duration_seconds = timer.elapsed().as_secs_f64(),
            tokens_used = tokens_used,
            "OpenAI completion finished"
        );

        Ok(content.to_string())
    }
}

#[async_trait]
impl GradingModel for AiGradingService {
    async fn grade(&self, request: &GradeRequest) -> Result<String> {
        let rubric = request
            .rubric
            .as_ref()
            .map(|rubric| serde_json::to_string_pretty(rubric).unwrap_or_default())
            .unwrap_or_else(|| "No rubric provided; use standard expectations.".to_string());
        let instructions = request.custom_instructions.as_deref().unwrap_or("None");

        let user_prompt = format!(
            "Student: {}\nSubject: {}\nGrade level: {}\n\nRubric:\n{}\n\nTeacher instructions:\n{}\n\nWorksheet text:\n{}\n",
            request.student_name,
            request.subject,
            request.grade_level,
            rubric,
            instructions,
            request.text
        );

        self.complete(GRADING_SYSTEM_PROMPT, user_prompt, true).await
    }
}

#[async_trait]
impl FeedbackWriter for AiGradingService {
    async fn write(&self, request: &FeedbackRequest) -> Result<String> {
        let user_prompt = format!(
            "Student: {}\nSubject: {}\nTone: {}\nScore: {}/{} ({}%, grade {})\n\nGrading details:\n{}\n",
            request.student_name,
            request.subject,
            request.tone,
            request.score.earned,
            request.score.possible,
            request.score.percentage,
            request.score.letter_grade,
            serde_json::to_string_pretty(&request.result).unwrap_or_default()
        );

        let text = self.complete(FEEDBACK_SYSTEM_PROMPT, user_prompt, false).await?;
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("OpenAI returned empty feedback");
        }
        Ok(text.to_string())
    }
}

fn error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}
