//! HR platform access (Zoho People REST API).
//!
//! Blocking reqwest: one invocation runs one cycle, no async runtime needed.
//! Payload parsing lives in free functions so it can be tested without a
//! server.

use crate::config::CloudConfig;
use crate::errors::{AppError, AppResult};
use crate::models::event::{CloudAttendance, CloudEntry};
use crate::models::punch_kind::PunchKind;
use crate::utils::time::parse_with_format;
use chrono::NaiveDateTime;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

/// Timestamps inside attendance payloads (`dateTimeFormat` request param).
pub const CLOUD_TIME_FMT: &str = "%d-%m-%Y %H:%M:%S";
const FROM_DATE_FMT: &str = "%d-%m-%Y";
const PUSH_TIME_FMT: &str = "%d/%m/%Y %H:%M:%S";
const MAX_ROSTER_PAGES: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    Rejected(u16, String),
}

pub trait CloudClient {
    fn get_access_token(&self) -> AppResult<String>;
    /// Active employee ids, all pages.
    fn fetch_roster(&self, token: &str) -> AppResult<BTreeSet<String>>;
    fn fetch_attendance(&self, token: &str, since: &NaiveDateTime) -> AppResult<Vec<CloudAttendance>>;
    fn push_event(
        &self,
        token: &str,
        employee_id: &str,
        time: &NaiveDateTime,
        kind: PunchKind,
    ) -> AppResult<PushOutcome>;
}

pub struct ZohoPeopleClient {
    http: Client,
    accounts_base: String,
    people_base: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_timeout: Duration,
    request_timeout: Duration,
    fetch_duration: u32,
    page_size: u32,
}

impl ZohoPeopleClient {
    pub fn new(cfg: &CloudConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(format!("punchsync/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            accounts_base: format!("https://accounts.{}", cfg.domain),
            people_base: format!("https://people.{}", cfg.domain),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            refresh_token: cfg.refresh_token.clone(),
            token_timeout: Duration::from_secs(cfg.token_timeout_secs),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            fetch_duration: cfg.fetch_duration,
            page_size: cfg.roster_page_size,
        })
    }

    fn authed(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.header("Authorization", format!("Zoho-oauthtoken {}", token))
            .timeout(self.request_timeout)
    }

    fn fetch_roster_page(&self, token: &str, page: u32) -> AppResult<RosterPage> {
        let url = format!("{}/people/api/forms/employee/getRecords", self.people_base);
        let body = serde_json::json!({ "page": page, "per_page": self.page_size });

        let resp = send(self.authed(self.http.post(&url), token).json(&body))?;
        let json: Value = check_status(resp)?.json()?;
        parse_roster_page(&json)
    }
}

impl CloudClient for ZohoPeopleClient {
    fn get_access_token(&self) -> AppResult<String> {
        if self.client_id.is_empty() || self.client_secret.is_empty() || self.refresh_token.is_empty()
        {
            return Err(AppError::Auth("cloud credentials are not configured".into()));
        }

        let url = format!("{}/oauth/v2/token", self.accounts_base);
        let form = [
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let resp = send(self.http.post(&url).form(&form).timeout(self.token_timeout))?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(AppError::TransientIo(format!("token endpoint returned {}", status)));
        }
        if !status.is_success() {
            return Err(AppError::Auth(format!("token endpoint returned {}", status)));
        }

        let json: Value = resp.json()?;
        let token = parse_token_response(&json)?;
        tracing::info!("access token retrieved");
        Ok(token)
    }

    fn fetch_roster(&self, token: &str) -> AppResult<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for page in 1..=MAX_ROSTER_PAGES {
            let p = self.fetch_roster_page(token, page)?;
            ids.extend(p.employee_ids);
            if p.records < self.page_size as usize {
                break;
            }
        }
        tracing::info!(employees = ids.len(), "roster fetched");
        Ok(ids)
    }

    fn fetch_attendance(&self, token: &str, since: &NaiveDateTime) -> AppResult<Vec<CloudAttendance>> {
        let url = format!(
            "{}/people/api/attendance/fetchLatestAttEntries",
            self.people_base
        );
        let from = since.format(FROM_DATE_FMT).to_string();
        let duration = self.fetch_duration.to_string();
        let query = [
            ("duration", duration.as_str()),
            ("fromDate", from.as_str()),
            ("dateTimeFormat", "dd-MM-yyyy HH:mm:ss"),
        ];

        tracing::info!(from_date = %from, "fetching cloud attendance");
        let resp = send(self.authed(self.http.get(&url), token).query(&query))?;
        let json: Value = check_status(resp)?.json()?;
        parse_attendance_response(&json)
    }

    fn push_event(
        &self,
        token: &str,
        employee_id: &str,
        time: &NaiveDateTime,
        kind: PunchKind,
    ) -> AppResult<PushOutcome> {
        let url = format!("{}/people/api/attendance", self.people_base);
        let formatted = time.format(PUSH_TIME_FMT).to_string();
        let field = match kind {
            PunchKind::CheckIn => "checkIn",
            PunchKind::CheckOut => "checkOut",
        };
        let form = [
            ("dateFormat", "dd/MM/yyyy HH:mm:ss"),
            ("empId", employee_id),
            (field, formatted.as_str()),
        ];

        let resp = send(self.authed(self.http.post(&url), token).form(&form))?;
        let status = resp.status();
        if status == StatusCode::OK {
            return Ok(PushOutcome::Accepted);
        }
        if is_auth_status(status) {
            return Err(AppError::Auth(format!("push rejected with {}", status)));
        }

        let body = resp.text().unwrap_or_default();
        Ok(PushOutcome::Rejected(status.as_u16(), body))
    }
}

// ---------------------------------------------------------------------------
// Transport helpers
// ---------------------------------------------------------------------------

fn send(req: RequestBuilder) -> AppResult<Response> {
    req.send()
        .map_err(|e| AppError::TransientIo(format!("request failed: {}", e)))
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn check_status(resp: Response) -> AppResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if is_auth_status(status) {
        return Err(AppError::Auth(format!("request rejected with {}", status)));
    }
    if status.is_server_error() {
        return Err(AppError::TransientIo(format!("server returned {}", status)));
    }
    Err(AppError::Other(format!("unexpected HTTP status {}", status)))
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

pub fn parse_token_response(json: &Value) -> AppResult<String> {
    if let Some(token) = json["access_token"].as_str().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    let reason = json["error"].as_str().unwrap_or("no access_token in response");
    Err(AppError::Auth(reason.to_string()))
}

/// One roster page: `records` counts form records (for paging), while
/// `employee_ids` holds the trimmed, non-empty `EmployeeID`s found in them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RosterPage {
    pub records: usize,
    pub employee_ids: Vec<String>,
}

fn response_ok(json: &Value) -> AppResult<&Value> {
    let response = &json["response"];
    match response["status"].as_i64() {
        Some(0) => Ok(response),
        _ => {
            let msg = response["message"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| response.to_string());
            Err(AppError::Parse(format!("cloud API error: {}", msg)))
        }
    }
}

/// `response.result` is a list of `{ "<record id>": [ { "EmployeeID": .. } ] }`.
pub fn parse_roster_page(json: &Value) -> AppResult<RosterPage> {
    let response = response_ok(json)?;
    let Some(result) = response["result"].as_array() else {
        return Ok(RosterPage::default());
    };

    let mut page = RosterPage {
        records: result.len(),
        employee_ids: Vec::new(),
    };

    for rec in result {
        let Some(groups) = rec.as_object() else {
            continue;
        };
        for group in groups.values() {
            for emp in group.as_array().into_iter().flatten() {
                if let Some(id) = emp["EmployeeID"].as_str().map(str::trim).filter(|s| !s.is_empty()) {
                    page.employee_ids.push(id.to_string());
                }
            }
        }
    }
    Ok(page)
}

/// `response.result[*]` carries `employeeId` and `entries`, a list of
/// `{ "<date>": { "attEntries": [ { "checkInTime"?, "checkOutTime"? } ] } }`.
/// An unparsable time drops only that half of the entry.
pub fn parse_attendance_response(json: &Value) -> AppResult<Vec<CloudAttendance>> {
    let response = response_ok(json)?;

    let mut out = Vec::new();
    for emp in response["result"].as_array().into_iter().flatten() {
        let Some(employee_id) = emp["employeeId"].as_str().map(str::trim).filter(|s| !s.is_empty())
        else {
            tracing::warn!("attendance block without employeeId skipped");
            continue;
        };

        let mut entries = Vec::new();
        for entry in emp["entries"].as_array().into_iter().flatten() {
            let Some(days) = entry.as_object() else {
                continue;
            };
            for day in days.values() {
                for att in day["attEntries"].as_array().into_iter().flatten() {
                    let e = CloudEntry {
                        check_in: entry_time(att, "checkInTime", employee_id),
                        check_out: entry_time(att, "checkOutTime", employee_id),
                    };
                    if e.check_in.is_some() || e.check_out.is_some() {
                        entries.push(e);
                    }
                }
            }
        }

        out.push(CloudAttendance {
            employee_id: employee_id.to_string(),
            entries,
        });
    }
    Ok(out)
}

fn entry_time(att: &Value, field: &str, employee_id: &str) -> Option<NaiveDateTime> {
    let raw = att[field].as_str()?;
    match parse_with_format(raw, CLOUD_TIME_FMT) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!(employee_id, field, error = %e, "unparsable cloud time skipped");
            None
        }
    }
}
