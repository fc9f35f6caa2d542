//! Shift calendars (BetterShift) and the coverage view built on them.
//!
//! Each calendar stands for one person. A shift with start and end times is
//! timed; one without, or flagged all-day, covers the whole day.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use localecho_config::CalendarConfig;
use localecho_core::error::ToolError;
use localecho_core::session::SessionContext;
use localecho_core::tool::{ParamKind, ParamSpec, Tool, ToolArgs};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

const SERVICE: &str = "BetterShift";

/// Titles that make a new shift all-day.
const ALL_DAY_TITLES: &[&str] = &[
    "off",
    "leave",
    "vacation",
    "holiday",
    "absent",
    "paternity leave",
    "maternity leave",
];

/// Words in an all-day title that mean the person is away.
const AWAY_WORDS: &[&str] = &["off", "leave", "vacation", "paternity"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
}

/// Body of `POST /api/shifts`. Absent optionals are sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewShift {
    pub calendar_id: String,
    pub title: String,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub is_all_day: bool,
    pub is_secondary: bool,
    pub preset_id: Option<String>,
}

/// Ids arrive as strings or numbers depending on the server version.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn list_calendars(&self) -> Result<Vec<Calendar>, ToolError>;

    /// Shifts of one calendar, optionally on one `YYYY-MM-DD` date.
    async fn list_shifts(&self, calendar_id: &str, date: Option<&str>) -> Result<Vec<Shift>, ToolError>;

    async fn create_shift(&self, shift: &NewShift) -> Result<Shift, ToolError>;
}

pub struct BetterShiftClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl BetterShiftClient {
    pub fn from_config(config: &CalendarConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    fn unavailable(reason: impl Into<String>) -> ToolError {
        ToolError::Unavailable {
            service: SERVICE.into(),
            reason: reason.into(),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ToolError> {
        let mut request = request.header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }
        let response = request.send().await.map_err(|e| Self::unavailable(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| Self::unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::unavailable(format!("API error {}: {body}", status.as_u16())));
        }
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body)
            .map_err(|e| ToolError::failed(SERVICE, format!("unexpected response: {e}")))
    }
}

#[async_trait]
impl CalendarClient for BetterShiftClient {
    async fn list_calendars(&self) -> Result<Vec<Calendar>, ToolError> {
        let url = format!("{}/api/calendars", self.base_url);
        let calendars: Option<Vec<Calendar>> = self.send(self.client.get(url)).await?;
        Ok(calendars.unwrap_or_default())
    }

    async fn list_shifts(&self, calendar_id: &str, date: Option<&str>) -> Result<Vec<Shift>, ToolError> {
        let url = format!("{}/api/shifts", self.base_url);
        let mut query = vec![("calendarId", calendar_id)];
        if let Some(date) = date {
            query.push(("date", date));
        }
        let shifts: Option<Vec<Shift>> = self.send(self.client.get(url).query(&query)).await?;
        let mut shifts = shifts.unwrap_or_default();
        for shift in &mut shifts {
            shift.date = match date {
                Some(date) => date.to_string(),
                None => normalize_shift_date(&shift.date),
            };
        }
        debug!(calendar = %calendar_id, shifts = shifts.len(), "Listed shifts");
        Ok(shifts)
    }

    async fn create_shift(&self, shift: &NewShift) -> Result<Shift, ToolError> {
        let url = format!("{}/api/shifts", self.base_url);
        let created: Shift = self.send(self.client.post(url).json(shift)).await?;
        info!(calendar = %shift.calendar_id, id = %created.id, "Shift created");
        Ok(created)
    }
}

/// ISO timestamps become local dates; plain dates pass through.
fn normalize_shift_date(date: &str) -> String {
    if !date.contains('T') {
        return date.to_string();
    }
    match chrono::DateTime::parse_from_rfc3339(date) {
        Ok(dt) => dt.with_timezone(&Local).date_naive().to_string(),
        Err(_) => date.split('T').next().unwrap_or(date).to_string(),
    }
}

/// Resolve `today`, `tomorrow` and weekday names to `YYYY-MM-DD`.
///
/// A weekday always means its next occurrence, never today. Anything else is
/// returned unchanged.
pub fn resolve_date(input: &str, today: NaiveDate) -> String {
    let trimmed = input.trim();
    if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return trimmed.to_string();
    }
    let lower = trimmed.to_lowercase();
    match lower.as_str() {
        "today" | "now" => return today.to_string(),
        "tomorrow" => return (today + chrono::Duration::days(1)).to_string(),
        _ => {}
    }
    match lower.parse::<Weekday>() {
        Ok(target) => {
            let mut ahead = target.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64;
            if ahead <= 0 {
                ahead += 7;
            }
            (today + chrono::Duration::days(ahead)).to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoverageStatus {
    Active,
    Upcoming,
    Off,
}

impl CoverageStatus {
    fn label(&self) -> &'static str {
        match self {
            CoverageStatus::Active => "Active",
            CoverageStatus::Upcoming => "Upcoming",
            CoverageStatus::Off => "Off",
        }
    }

    fn marker(&self) -> &'static str {
        match self {
            CoverageStatus::Active => "🟢",
            CoverageStatus::Upcoming => "🟡",
            CoverageStatus::Off => "⚪",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub name: String,
    pub status: CoverageStatus,
    pub detail: String,
}

fn span(minutes: i64) -> String {
    let (h, m) = (minutes / 60, minutes % 60);
    if h > 0 { format!("{h}h {m}m") } else { format!("{m}m") }
}

fn parse_time(value: Option<&str>) -> Option<NaiveTime> {
    let value = value?.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Status of one person from today's shifts. The first decisive shift wins.
pub fn assess(name: &str, shifts: &[Shift], now: NaiveDateTime) -> Coverage {
    let mut coverage = Coverage {
        name: name.to_string(),
        status: CoverageStatus::Off,
        detail: String::new(),
    };

    for shift in shifts {
        let start = parse_time(shift.start_time.as_deref());
        let end = parse_time(shift.end_time.as_deref());

        let (Some(start), Some(end), false) = (start, end, shift.is_all_day) else {
            let title = shift.title.to_lowercase();
            coverage.status = if AWAY_WORDS.iter().any(|w| title.contains(w)) {
                CoverageStatus::Off
            } else {
                CoverageStatus::Active
            };
            coverage.detail = "all day".into();
            return coverage;
        };

        let start = now.date().and_time(start);
        let end = now.date().and_time(end);
        if start <= now && now <= end {
            coverage.status = CoverageStatus::Active;
            coverage.detail = format!("{} remaining", span((end - now).num_minutes()));
            return coverage;
        }
        if now < start {
            coverage.status = CoverageStatus::Upcoming;
            coverage.detail = format!("starts in {}", span((start - now).num_minutes()));
            return coverage;
        }
    }
    coverage
}

/// `Current Coverage:` followed by one marked line per person, Active first.
pub fn render_coverage(mut entries: Vec<Coverage>) -> String {
    entries.sort_by_key(|c| c.status);
    let mut out = String::from("Current Coverage:");
    for entry in &entries {
        out.push_str(&format!(
            "\n{} {} - {}",
            entry.status.marker(),
            entry.name,
            entry.status.label()
        ));
        if !entry.detail.is_empty() {
            out.push_str(&format!(" ({})", entry.detail));
        }
    }
    out
}

pub struct ListCalendarsTool {
    client: Arc<dyn CalendarClient>,
}

impl ListCalendarsTool {
    pub fn new(client: Arc<dyn CalendarClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListCalendarsTool {
    fn name(&self) -> &'static str {
        "list_calendars"
    }

    fn description(&self) -> &'static str {
        "List the shift calendars (one per person) with their IDs."
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let calendars = self.client.list_calendars().await?;
        if calendars.is_empty() {
            return Ok("No calendars found.".into());
        }
        Ok(calendars
            .iter()
            .map(|c| format!("- {}: {} ({})", c.id, c.name, c.color.as_deref().unwrap_or("none")))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

pub struct ListShiftsTool {
    client: Arc<dyn CalendarClient>,
}

impl ListShiftsTool {
    pub fn new(client: Arc<dyn CalendarClient>) -> Self {
        Self { client }
    }
}

static LIST_SHIFTS_PARAMS: [ParamSpec; 2] = [
    ParamSpec::required("calendar_id", ParamKind::Str),
    ParamSpec::optional("date", ParamKind::Str),
];

#[async_trait]
impl Tool for ListShiftsTool {
    fn name(&self) -> &'static str {
        "list_shifts"
    }

    fn description(&self) -> &'static str {
        "List shifts of a calendar, optionally on one date (YYYY-MM-DD, today, tomorrow or a weekday)."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &LIST_SHIFTS_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("list_shifts(\"cal_1\", \"tomorrow\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let calendar_id = args.require_str("calendar_id")?;
        let date = args
            .str("date")
            .map(|d| resolve_date(d, Local::now().date_naive()));
        let shifts = self.client.list_shifts(calendar_id, date.as_deref()).await?;
        if shifts.is_empty() {
            return Ok("No shifts found.".into());
        }
        Ok(shifts
            .iter()
            .map(|s| {
                format!(
                    "- {}: {} on {} ({} - {})",
                    s.id,
                    s.title,
                    s.date,
                    s.start_time.as_deref().unwrap_or("all day"),
                    s.end_time.as_deref().unwrap_or("all day")
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

pub struct CreateShiftTool {
    client: Arc<dyn CalendarClient>,
}

impl CreateShiftTool {
    pub fn new(client: Arc<dyn CalendarClient>) -> Self {
        Self { client }
    }
}

static CREATE_SHIFT_PARAMS: [ParamSpec; 5] = [
    ParamSpec::required("calendar_id", ParamKind::Str),
    ParamSpec::required("title", ParamKind::Str),
    ParamSpec::required("date", ParamKind::Str),
    ParamSpec::optional("start_time", ParamKind::Str),
    ParamSpec::optional("end_time", ParamKind::Str),
];

#[async_trait]
impl Tool for CreateShiftTool {
    fn name(&self) -> &'static str {
        "create_shift"
    }

    fn description(&self) -> &'static str {
        "Create a shift. Titles like Off, Leave or Vacation become all-day entries."
    }

    fn params(&self) -> &'static [ParamSpec] {
        &CREATE_SHIFT_PARAMS
    }

    fn example(&self) -> Option<&'static str> {
        Some("create_shift(\"cal_1\", \"Morning\", \"tomorrow\", \"08:00\", \"16:00\")")
    }

    async fn execute(&self, args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        let title = args.require_str("title")?;
        let date = resolve_date(args.require_str("date")?, Local::now().date_naive());
        let is_all_day = ALL_DAY_TITLES.contains(&title.to_lowercase().as_str());

        let request = NewShift {
            calendar_id: args.require_str("calendar_id")?.to_string(),
            title: title.to_string(),
            date: date.clone(),
            start_time: args.str("start_time").map(str::to_string),
            end_time: args.str("end_time").map(str::to_string),
            color: None,
            notes: None,
            is_all_day,
            is_secondary: false,
            preset_id: None,
        };
        let created = self.client.create_shift(&request).await?;
        let title = if created.title.is_empty() { title } else { created.title.as_str() };
        Ok(format!("✅ Created shift '{title}' for {date} (ID: {})", created.id))
    }
}

pub struct CheckEntityStatusTool {
    client: Arc<dyn CalendarClient>,
}

impl CheckEntityStatusTool {
    pub fn new(client: Arc<dyn CalendarClient>) -> Self {
        Self { client }
    }

    /// Coverage at `now` across every calendar.
    pub async fn coverage_at(&self, now: NaiveDateTime) -> Result<String, ToolError> {
        let calendars = self.client.list_calendars().await?;
        if calendars.is_empty() {
            return Ok("No calendars found.".into());
        }
        let today = now.date().to_string();
        let lookups = calendars
            .iter()
            .map(|c| self.client.list_shifts(&c.id, Some(today.as_str())));
        let results = futures::future::join_all(lookups).await;

        let mut entries = Vec::with_capacity(calendars.len());
        for (calendar, shifts) in calendars.iter().zip(results) {
            let name = if calendar.name.is_empty() { "Unknown" } else { calendar.name.as_str() };
            entries.push(assess(name, &shifts?, now));
        }
        Ok(render_coverage(entries))
    }
}

#[async_trait]
impl Tool for CheckEntityStatusTool {
    fn name(&self) -> &'static str {
        "check_entity_status"
    }

    fn description(&self) -> &'static str {
        "Show who is working right now, who starts soon and who is off today."
    }

    fn example(&self) -> Option<&'static str> {
        Some("check_entity_status()")
    }

    async fn execute(&self, _args: ToolArgs, _session: &mut SessionContext) -> Result<String, ToolError> {
        self.coverage_at(Local::now().naive_local()).await
    }
}
