use crate::application::use_cases::AnalyticsPipeline;
use crate::domain::outcome::{PipelineOutcome, ResultRow};
use crate::infrastructure::db::AnalyticsStore;
use crate::infrastructure::prompts::PromptStore;
use actix_cors::Cors;
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
    pub time: String,
}

pub struct HttpState {
    pub pipeline: Arc<AnalyticsPipeline>,
    pub store: Arc<AnalyticsStore>,
    pub prompts: Arc<PromptStore>,
    pub has_api_key: bool,
    pub sessions: Mutex<HashMap<String, Vec<ChatTurn>>>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub session_id: String,
    pub answer: String,
    pub result: PipelineOutcome,
}

#[post("/ask")]
async fn ask(data: web::Data<HttpState>, req: web::Json<AskRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest()
            .json(serde_json::json!({ "error": errors.to_string() }));
    }

    let session_id = req
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!("Question received (session={})", session_id),
    );

    let outcome = data.pipeline.run(&req.question).await;
    let answer = format_answer(&outcome);

    if !outcome.success {
        add_log(
            &data.logs,
            "ERROR",
            "HttpApi",
            &format!(
                "Pipeline failed: {}",
                outcome.error.as_deref().unwrap_or("unknown")
            ),
        );
    }

    let now = Local::now().format("%H:%M:%S").to_string();
    let mut sessions = data.sessions.lock().unwrap();
    let turns = sessions.entry(session_id.clone()).or_default();
    turns.push(ChatTurn {
        role: "user".to_string(),
        content: req.question.clone(),
        time: now.clone(),
    });
    turns.push(ChatTurn {
        role: "assistant".to_string(),
        content: answer.clone(),
        time: now,
    });
    drop(sessions);

    HttpResponse::Ok().json(AskResponse {
        session_id,
        answer,
        result: outcome,
    })
}

#[get("/history/{session_id}")]
async fn history(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    let sessions = data.sessions.lock().unwrap();
    let turns = sessions.get(&session_id).cloned().unwrap_or_default();
    HttpResponse::Ok().json(turns)
}

#[post("/clear/{session_id}")]
async fn clear(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    let removed = data.sessions.lock().unwrap().remove(&session_id).is_some();
    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!("Session cleared (session={} existed={})", session_id, removed),
    );
    HttpResponse::Ok().json(serde_json::json!({ "cleared": removed }))
}

#[get("/health")]
async fn health(data: web::Data<HttpState>) -> impl Responder {
    let database = data.store.ping().await.is_ok();
    let prompts = data.prompts.dir().is_dir();

    let healthy = database && prompts && data.has_api_key;
    let body = serde_json::json!({
        "status": if healthy { "ok" } else { "degraded" },
        "database": database,
        "prompts": prompts,
        "api_key": data.has_api_key,
    });

    if healthy {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data.logs.lock().unwrap();
    HttpResponse::Ok().json(&*logs)
}

/// Render a pipeline outcome as the assistant's chat message: insights
/// first, then a short data summary with up to three sample rows.
pub fn format_answer(outcome: &PipelineOutcome) -> String {
    if !outcome.success {
        return format!(
            "I couldn't answer that question: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let mut answer = outcome.insights.clone().unwrap_or_default();
    let row_count = outcome.row_count.unwrap_or(0);

    answer.push_str(&format!("\n\nFound {} records.", row_count));

    if let Some(rows) = &outcome.rows {
        for (i, row) in rows.iter().take(5).enumerate() {
            answer.push('\n');
            answer.push_str(&format!("{}. {}", i + 1, format_sample_row(row)));
        }
        if rows.len() > 5 {
            answer.push_str(&format!("\n... and {} more", rows.len() - 5));
        }
    }

    answer
}

/// One sample row as "col: value" pairs, first three columns in name order,
/// with a trailing marker when the row has more columns than shown.
fn format_sample_row(row: &ResultRow) -> String {
    let mut columns: Vec<&String> = row.keys().collect();
    columns.sort();

    let mut rendered = columns
        .iter()
        .take(3)
        .map(|name| {
            let value = match &row[*name] {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}: {}", name, value)
        })
        .collect::<Vec<_>>()
        .join(" | ");

    if columns.len() > 3 {
        rendered.push_str(" | ...");
    }
    rendered
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().unwrap();
    logs.push(entry);
    if logs.len() > 100 {
        logs.remove(0);
    }
}

pub fn start_server(state: HttpState, host: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // local tool, all origins allowed

        App::new().wrap(cors).app_data(state.clone()).service(
            web::scope("/api")
                .service(ask)
                .service(history)
                .service(clear)
                .service(health)
                .service(get_logs),
        )
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_answer_success_with_sample() {
        let mut row = ResultRow::new();
        row.insert("n".to_string(), serde_json::json!(3));

        let outcome = PipelineOutcome {
            success: true,
            analysis: None,
            statement: Some("SELECT COUNT(*) AS n FROM orders".to_string()),
            explanation: None,
            rows: Some(vec![row]),
            row_count: Some(1),
            insights: Some("There are 3 orders.".to_string()),
            error: None,
        };

        let answer = format_answer(&outcome);
        assert!(answer.starts_with("There are 3 orders."));
        assert!(answer.contains("Found 1 records."));
        assert!(answer.contains("1. n: 3"));
    }

    #[test]
    fn test_format_answer_truncates_sample_at_five() {
        let rows: Vec<ResultRow> = (0..7)
            .map(|i| {
                let mut row = ResultRow::new();
                row.insert("id".to_string(), serde_json::json!(i));
                row
            })
            .collect();

        let outcome = PipelineOutcome {
            success: true,
            analysis: None,
            statement: None,
            explanation: None,
            row_count: Some(rows.len()),
            rows: Some(rows),
            insights: Some("ids".to_string()),
            error: None,
        };

        let answer = format_answer(&outcome);
        assert!(answer.contains("5. id: 4"));
        assert!(!answer.contains("6. id: 5"));
        assert!(answer.contains("... and 2 more"));
    }

    #[test]
    fn test_format_sample_row_marks_extra_columns() {
        let mut row = ResultRow::new();
        for name in ["a", "b", "c", "d"] {
            row.insert(name.to_string(), serde_json::json!(1));
        }
        let rendered = format_sample_row(&row);
        assert_eq!(rendered, "a: 1 | b: 1 | c: 1 | ...");
    }

    #[test]
    fn test_format_answer_failure() {
        let outcome = PipelineOutcome::failure("SQL validation failed: Forbidden keyword: DELETE".to_string());
        let answer = format_answer(&outcome);
        assert!(answer.contains("couldn't answer"));
        assert!(answer.contains("DELETE"));
    }

    #[test]
    fn test_log_buffer_is_capped() {
        let logs = Mutex::new(Vec::new());
        for i in 0..150 {
            add_log(&logs, "INFO", "Test", &format!("message {}", i));
        }
        let logs = logs.lock().unwrap();
        assert_eq!(logs.len(), 100);
        assert_eq!(logs[0].message, "message 50");
    }
}
