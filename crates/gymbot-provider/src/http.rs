//! HTTP implementation of [`BookingProvider`] against the chain's member API.
//!
//! Creating a booking is a two-step dance: search the day's participations
//! for the class matching name + start time, then create the booking by the
//! id found. The chain opens the search 24 h ahead, which is why the engine
//! fires the day before the class.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use gymbot_core::{config::ProviderConfig, ClassTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BookingProvider, CreateOutcome, ProviderError, ProviderSession, Result};

const LOGIN_ENDPOINT: &str = "/api/user/authenticate";
const SEARCH_BOOKING_ENDPOINT: &str = "/api/classes/search-booking-participations";
const CREATE_BOOKING_ENDPOINT: &str = "/api/booking/create-booking";
const CANCEL_BOOKING_ENDPOINT: &str = "/api/booking/cancel-booking";

#[derive(Serialize)]
struct AuthRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(rename = "sessionTimeoutOneMonth")]
    session_timeout_one_month: bool,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
    user: AuthUser,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthUser {
    user_id: i64,
    center_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    centers: Vec<&'a str>,
    date_from: String,
    date_to: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Participation {
    pub(crate) booking: Option<BookingInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookingInfo {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) start_time: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    selected_user_id: i64,
    selected_user_center_id: &'a str,
    booking_center_id: i64,
    booking_id: i64,
}

#[derive(Deserialize)]
struct CreateResponse {
    id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelRequest<'a> {
    selected_user_id: i64,
    selected_user_center_id: &'a str,
    participation_center_id: i64,
    participation_id: i64,
}

/// Pick the booking whose class name and start time match. Start times are
/// compared as parsed [`ClassTime`]s because the provider renders unpadded
/// hours ("9:00") in some responses.
pub(crate) fn find_booking_id(
    participations: &[Participation],
    class_name: &str,
    class_time: ClassTime,
) -> Option<i64> {
    participations
        .iter()
        .filter_map(|p| p.booking.as_ref())
        .find(|b| {
            b.name == class_name
                && b.start_time
                    .parse::<ClassTime>()
                    .is_ok_and(|t| t == class_time)
        })
        .map(|b| b.id)
}

pub struct HttpBookingProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBookingProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn transport_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(e.to_string())
        }
    }

    async fn post_json<B: Serialize>(
        &self,
        endpoint: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .timeout(self.timeout)
            .json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let response = req.send().await.map_err(Self::transport_error)?;
        response
            .error_for_status()
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }
}

#[async_trait]
impl BookingProvider for HttpBookingProvider {
    async fn authenticate(&self, username: &str, secret: &str) -> Result<ProviderSession> {
        let response = self
            .post_json(
                LOGIN_ENDPOINT,
                None,
                &AuthRequest {
                    email: username,
                    password: secret,
                    session_timeout_one_month: false,
                },
            )
            .await?;

        // Missing token/user fields means the credentials were not accepted.
        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::AuthRejected(e.to_string()))?;

        debug!(user_id = auth.user.user_id, "provider authentication succeeded");
        Ok(ProviderSession {
            token: auth.token,
            user_id: auth.user.user_id,
            center_id: auth.user.center_id,
        })
    }

    async fn create_booking(
        &self,
        session: &ProviderSession,
        center: &str,
        class_date: NaiveDate,
        class_time: ClassTime,
        class_name: &str,
    ) -> Result<CreateOutcome> {
        let date = class_date.format("%Y-%m-%d").to_string();
        let response = self
            .post_json(
                SEARCH_BOOKING_ENDPOINT,
                Some(&session.token),
                &SearchRequest {
                    centers: vec![center],
                    date_from: date.clone(),
                    date_to: date.clone(),
                },
            )
            .await?;
        let participations: Vec<Participation> = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        let Some(booking_id) = find_booking_id(&participations, class_name, class_time) else {
            debug!(%center, %date, %class_name, "no matching class in search results");
            return Ok(CreateOutcome::SlotNotFound);
        };

        let response = self
            .post_json(
                CREATE_BOOKING_ENDPOINT,
                Some(&session.token),
                &CreateRequest {
                    selected_user_id: session.user_id,
                    selected_user_center_id: center,
                    booking_center_id: session.center_id,
                    booking_id,
                },
            )
            .await?;
        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::UnexpectedResponse(e.to_string()))?;

        match created.id {
            Some(id) => Ok(CreateOutcome::Created {
                booking_id: id.to_string(),
            }),
            None => Err(ProviderError::UnexpectedResponse(
                "create-booking response carried no id".to_string(),
            )),
        }
    }

    async fn cancel_booking(
        &self,
        session: &ProviderSession,
        center: &str,
        booking_id: &str,
    ) -> Result<()> {
        let participation_id: i64 = booking_id.parse().map_err(|_| {
            ProviderError::UnexpectedResponse(format!("non-numeric booking id: {booking_id}"))
        })?;
        self.post_json(
            CANCEL_BOOKING_ENDPOINT,
            Some(&session.token),
            &CancelRequest {
                selected_user_id: session.user_id,
                selected_user_center_id: center,
                participation_center_id: session.center_id,
                participation_id,
            },
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participations() -> Vec<Participation> {
        serde_json::from_str(
            r#"[
                {"booking": {"id": 1, "name": "Yoga", "startTime": "9:00"}},
                {"booking": {"id": 2, "name": "Body Pump", "startTime": "10:30"}},
                {"booking": null},
                {"booking": {"id": 3, "name": "Body Pump", "startTime": "18:00"}}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn matches_on_name_and_time() {
        let time: ClassTime = "10:30".parse().unwrap();
        assert_eq!(find_booking_id(&participations(), "Body Pump", time), Some(2));
    }

    #[test]
    fn unpadded_provider_times_still_match() {
        let time: ClassTime = "09:00".parse().unwrap();
        assert_eq!(find_booking_id(&participations(), "Yoga", time), Some(1));
    }

    #[test]
    fn no_match_when_name_or_time_differ() {
        let time: ClassTime = "10:30".parse().unwrap();
        assert_eq!(find_booking_id(&participations(), "Cycling", time), None);
        let time: ClassTime = "11:00".parse().unwrap();
        assert_eq!(find_booking_id(&participations(), "Body Pump", time), None);
    }

    #[test]
    fn entries_without_booking_are_skipped() {
        let empty: Vec<Participation> = serde_json::from_str(r#"[{"booking": null}]"#).unwrap();
        let time: ClassTime = "10:30".parse().unwrap();
        assert_eq!(find_booking_id(&empty, "Yoga", time), None);
    }
}
