//! The executor: one removal request in, one settled outcome out.
//!
//! `dispatch` walks the action through `draft → prepared → sent` while
//! holding two guarantees:
//!
//! - at most one external send cycle per idempotency key, ever; duplicates
//!   replay the first call's recorded outcome;
//! - exactly one attempt row per call, whether the call sent, was rejected
//!   by the breaker, or failed.
//!
//! Failure routing follows the error's nature. Transient failures retry on
//! the backoff schedule inside the call and, once exhausted, park the
//! request in the DLQ; the caller is told `queued`, not `failed`. Breaker
//! rejections release the idempotency claim and record no breaker failure;
//! a rejection is not evidence the controller is failing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::action::Action;
use crate::attempt::DispatchAttempt;
use crate::breaker::{self, BreakerConfig};
use crate::channel::{self, ChannelTarget};
use crate::dlq::DlqEntry;
use crate::error::Result;
use crate::idempotency::{self, Ensure, IdempotencyRecord, IdempotencyStatus};
use crate::policy::{self, Policy};
use crate::profile::ProfileRegistry;
use crate::retry::{self, BackoffPolicy, Sleeper};
use crate::store::Store;
use crate::subject::Subject;
use crate::transport::{DeliveryError, FormClient, Mailer};
use crate::types::{ActionStatus, Channel, ErrorCode};

// ---------------------------------------------------------------------------
// Request and receipt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub controller_key: String,
    /// Display name for the rendered request when the profile has none.
    pub controller_name: Option<String>,
    pub subject: Subject,
    pub locale: Option<String>,
}

/// In-band outcome of one dispatch call. Delivery problems live here, not
/// in `Err`; only validation, configuration, and storage problems escape as
/// errors.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReceipt {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl DispatchReceipt {
    pub(crate) fn sent(action_id: Uuid, channel: Channel, provider_id: Option<String>, note: Option<String>) -> Self {
        Self {
            ok: true,
            action_id: Some(action_id),
            channel: Some(channel),
            provider_id,
            note,
            error: None,
            hint: None,
        }
    }

    pub(crate) fn rejected(action_id: Option<Uuid>, error: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            ok: false,
            action_id,
            channel: None,
            provider_id: None,
            note: None,
            error: Some(error.into()),
            hint,
        }
    }

    fn queued(action_id: Uuid, channel: Channel, note: String) -> Self {
        Self {
            ok: false,
            action_id: Some(action_id),
            channel: Some(channel),
            provider_id: None,
            note: Some(note),
            error: Some("queued".to_string()),
            hint: Some("parked in the dlq; retry via dlq retry".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<'a> {
    store: &'a Store,
    registry: &'a ProfileRegistry,
    mailer: &'a dyn Mailer,
    forms: &'a dyn FormClient,
    sleeper: &'a dyn Sleeper,
    backoff: BackoffPolicy,
    breaker: BreakerConfig,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        store: &'a Store,
        registry: &'a ProfileRegistry,
        mailer: &'a dyn Mailer,
        forms: &'a dyn FormClient,
        sleeper: &'a dyn Sleeper,
        backoff: BackoffPolicy,
        breaker: BreakerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            mailer,
            forms,
            sleeper,
            backoff,
            breaker,
        }
    }

    /// Dispatch one removal request end to end.
    pub fn dispatch(&self, request: DispatchRequest, now: DateTime<Utc>) -> Result<DispatchReceipt> {
        request.subject.validate()?;
        let profile = self.registry.get(&request.controller_key)?;
        let region = request
            .locale
            .as_deref()
            .and_then(policy::region_of_locale);
        let policy = policy::resolve(self.registry, &request.controller_key, region.as_deref())?;
        let target = channel::resolve_target(profile)?;

        let key = idempotency::dispatch_key(
            &request.controller_key,
            &request.subject,
            request.locale.as_deref(),
        );

        // Claim the key before any side effect. The claim carries the id the
        // action will be created under, so a duplicate can point back at it.
        let action_id = Uuid::new_v4();
        let claim = IdempotencyRecord::in_progress(action_id, now);
        match self.store.idempotency_ensure(&key, &claim)? {
            Ensure::Claimed => {}
            Ensure::Exists(prior) => match prior.status {
                IdempotencyStatus::Failed => {
                    // A cached failure never bricks the pair; take the claim
                    // over and run a fresh dispatch.
                    self.store.idempotency_set(&key, &claim)?;
                }
                _ => return Ok(self.replay(&key, &prior)),
            },
        }

        let mut action = Action::new(
            request.controller_key.clone(),
            request.subject.clone(),
            target.channel(),
            request.locale.clone(),
            policy.sla_days,
            now,
        );
        action.id = action_id;
        self.store.insert_action(&action)?;
        self.store
            .transition_action(action_id, &[ActionStatus::Draft], ActionStatus::Prepared, now)?;

        let decision = breaker::check(self.store, &self.breaker, &request.controller_key, now);
        if !decision.allow {
            let note = format!("circuit open: {} recent failures", decision.recent_failures);
            self.store.append_attempt(&DispatchAttempt::failure(
                action_id,
                target.channel(),
                ErrorCode::BreakerOpen,
                note.clone(),
                now,
            ))?;
            self.store.update_action_if(action_id, &[ActionStatus::Prepared], now, |a| {
                a.last_error = Some(note.clone());
            })?;
            // Release the claim: a rejection is not an outcome, and the next
            // call should get a clean run once the breaker cools down.
            self.store.idempotency_remove(&key)?;
            tracing::info!(
                controller = %request.controller_key,
                failures = decision.recent_failures,
                "dispatch rejected, breaker open"
            );
            return Ok(DispatchReceipt::rejected(
                Some(action_id),
                "breaker_open",
                Some("controller is failing; retry after the breaker window".to_string()),
            ));
        }

        let display_name = request
            .controller_name
            .clone()
            .unwrap_or_else(|| profile.name.clone());
        let outcome = self.deliver(&target, &display_name, &request.subject, &policy);

        match outcome {
            Ok(delivery) => {
                self.store.update_action_if(action_id, &[ActionStatus::Prepared], now, |a| {
                    a.status = ActionStatus::Sent;
                    a.provider_id = delivery.provider_id.clone();
                    a.last_error = None;
                })?;
                self.store.append_attempt(&DispatchAttempt::success(
                    action_id,
                    target.channel(),
                    delivery.provider_id.clone(),
                    delivery.note.clone(),
                    now,
                ))?;
                self.store.idempotency_set(
                    &key,
                    &IdempotencyRecord {
                        status: IdempotencyStatus::Sent,
                        action_id,
                        provider_id: delivery.provider_id.clone(),
                        error_code: None,
                        first_seen: now,
                    },
                )?;
                tracing::info!(
                    controller = %request.controller_key,
                    channel = %target.channel(),
                    provider_id = delivery.provider_id.as_deref().unwrap_or("-"),
                    "dispatch sent"
                );
                Ok(DispatchReceipt::sent(
                    action_id,
                    target.channel(),
                    delivery.provider_id,
                    delivery.note,
                ))
            }
            Err(err) => {
                self.store.update_action_if(action_id, &[ActionStatus::Prepared], now, |a| {
                    a.retries += 1;
                    a.last_error = Some(err.to_string());
                })?;
                self.store.append_attempt(&DispatchAttempt::failure(
                    action_id,
                    target.channel(),
                    err.code,
                    err.note.clone(),
                    now,
                ))?;

                if err.transient {
                    // Exhausted the in-call schedule; park for a later retry
                    // and let the caller move on.
                    let payload = render_payload(&target, &display_name, &request.subject, &policy);
                    let entry = DlqEntry::new(
                        &self.store.get_action(action_id)?,
                        key.clone(),
                        payload,
                        err.code,
                        err.note.clone(),
                        now,
                    );
                    self.store.push_dlq(&entry)?;
                    breaker::record_failure(
                        self.store,
                        &request.controller_key,
                        err.code,
                        &err.note,
                        now,
                    )?;
                    self.store.idempotency_set(
                        &key,
                        &IdempotencyRecord {
                            status: IdempotencyStatus::Queued,
                            action_id,
                            provider_id: None,
                            error_code: Some(err.code),
                            first_seen: now,
                        },
                    )?;
                    tracing::warn!(
                        controller = %request.controller_key,
                        code = %err.code,
                        "dispatch exhausted retries, parked in dlq"
                    );
                    Ok(DispatchReceipt::queued(
                        action_id,
                        target.channel(),
                        format!("delivery failed after {} tries: {}", self.backoff.tries, err.note),
                    ))
                } else {
                    self.store.idempotency_set(
                        &key,
                        &IdempotencyRecord {
                            status: IdempotencyStatus::Failed,
                            action_id,
                            provider_id: None,
                            error_code: Some(err.code),
                            first_seen: now,
                        },
                    )?;
                    tracing::warn!(
                        controller = %request.controller_key,
                        code = %err.code,
                        "dispatch failed without retry"
                    );
                    Ok(DispatchReceipt::rejected(
                        Some(action_id),
                        err.code.as_str(),
                        Some(err.note),
                    ))
                }
            }
        }
    }

    /// Replay a prior outcome for a duplicate request. Never sends.
    fn replay(&self, key: &str, prior: &IdempotencyRecord) -> DispatchReceipt {
        let channel = self
            .store
            .get_action(prior.action_id)
            .ok()
            .map(|a| a.channel);
        match prior.status {
            IdempotencyStatus::Sent => DispatchReceipt {
                ok: true,
                action_id: Some(prior.action_id),
                channel,
                provider_id: prior.provider_id.clone(),
                note: Some("duplicate request: original outcome replayed".to_string()),
                error: None,
                hint: None,
            },
            IdempotencyStatus::Queued => DispatchReceipt {
                ok: false,
                action_id: Some(prior.action_id),
                channel,
                provider_id: None,
                note: Some("duplicate request: already parked for retry".to_string()),
                error: Some("queued".to_string()),
                hint: None,
            },
            IdempotencyStatus::InProgress => {
                tracing::debug!(key, "duplicate dispatch while claim in progress");
                DispatchReceipt {
                    ok: false,
                    action_id: Some(prior.action_id),
                    channel,
                    provider_id: None,
                    note: Some("a dispatch for this request is already in flight".to_string()),
                    error: Some("in_progress".to_string()),
                    hint: None,
                }
            }
            // Failed claims are taken over before replay is reached.
            IdempotencyStatus::Failed => DispatchReceipt::rejected(
                Some(prior.action_id),
                prior
                    .error_code
                    .unwrap_or(ErrorCode::Internal)
                    .as_str(),
                None,
            ),
        }
    }

    /// Run the channel send with the in-call retry schedule. Used by the
    /// first dispatch and by DLQ retries, which re-resolve their target
    /// before calling in.
    pub(crate) fn deliver(
        &self,
        target: &ChannelTarget,
        controller_name: &str,
        subject: &Subject,
        policy: &Policy,
    ) -> std::result::Result<Delivery, DeliveryError> {
        retry::run(
            &self.backoff,
            self.sleeper,
            |err: &DeliveryError| err.transient,
            |_attempt| self.send_once(target, controller_name, subject, policy),
        )
    }

    /// One channel send. The match is exhaustive so a new channel kind
    /// cannot ship without an executor arm.
    fn send_once(
        &self,
        target: &ChannelTarget,
        controller_name: &str,
        subject: &Subject,
        policy: &Policy,
    ) -> std::result::Result<Delivery, DeliveryError> {
        match target {
            ChannelTarget::Email {
                to,
                subject_template,
            } => {
                let subject_line = render_template(subject_template, subject);
                let body = render_body(controller_name, subject, policy);
                let provider_id = self.mailer.send(to, &subject_line, &body)?;
                Ok(Delivery {
                    provider_id: Some(provider_id),
                    note: None,
                })
            }
            ChannelTarget::Webform { url } | ChannelTarget::Portal { url } => {
                let fields = form_fields(subject, policy);
                let receipt = self.forms.submit(url, &fields)?;
                Ok(Delivery {
                    provider_id: receipt.provider_id,
                    note: Some(format!("form accepted with status {}", receipt.status)),
                })
            }
            ChannelTarget::Api { url } => {
                let body = api_body(subject, policy);
                let receipt = self.forms.call(url, &body)?;
                Ok(Delivery {
                    provider_id: receipt.provider_id,
                    note: Some(format!("api accepted with status {}", receipt.status)),
                })
            }
        }
    }
}

/// Settled output of a successful channel send.
pub(crate) struct Delivery {
    pub provider_id: Option<String>,
    pub note: Option<String>,
}

// ---------------------------------------------------------------------------
// Payload rendering
// ---------------------------------------------------------------------------

/// Fill `{name}` and `{email}` placeholders from the subject.
fn render_template(template: &str, subject: &Subject) -> String {
    template
        .replace("{name}", subject.name.as_deref().unwrap_or(""))
        .replace("{email}", subject.email.as_deref().unwrap_or(""))
        .trim()
        .to_string()
}

fn render_body(controller_name: &str, subject: &Subject, policy: &Policy) -> String {
    let mut body = format!(
        "To the privacy team at {controller_name},\n\n\
         I request the deletion of my personal data under {}.\n\n\
         Identifying details:\n",
        policy.legal_basis
    );
    if let Some(name) = &subject.name {
        body.push_str(&format!("- name: {name}\n"));
    }
    if let Some(email) = &subject.email {
        body.push_str(&format!("- email: {email}\n"));
    }
    if let Some(phone) = &subject.phone {
        body.push_str(&format!("- phone: {phone}\n"));
    }
    body.push_str(&format!(
        "\nPlease confirm completion within {} days.\n",
        policy.sla_days
    ));
    body
}

fn form_fields(subject: &Subject, policy: &Policy) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    if let Some(name) = &subject.name {
        fields.insert("name".to_string(), name.clone());
    }
    if let Some(email) = &subject.email {
        fields.insert("email".to_string(), email.clone());
    }
    if let Some(phone) = &subject.phone {
        fields.insert("phone".to_string(), phone.clone());
    }
    fields.insert("request_type".to_string(), "data_removal".to_string());
    fields.insert("legal_basis".to_string(), policy.legal_basis.clone());
    fields
}

fn api_body(subject: &Subject, policy: &Policy) -> serde_json::Value {
    serde_json::json!({
        "kind": "data_removal",
        "subject": {
            "name": subject.name,
            "email": subject.email,
            "phone": subject.phone,
        },
        "legal_basis": policy.legal_basis,
    })
}

/// Opaque payload stored on a DLQ entry for operator triage and retries.
fn render_payload(
    target: &ChannelTarget,
    controller_name: &str,
    subject: &Subject,
    policy: &Policy,
) -> serde_json::Value {
    match target {
        ChannelTarget::Email {
            to,
            subject_template,
        } => serde_json::json!({
            "channel": "email",
            "to": to,
            "subject": render_template(subject_template, subject),
            "body": render_body(controller_name, subject, policy),
        }),
        ChannelTarget::Webform { url } => serde_json::json!({
            "channel": "webform",
            "url": url,
            "fields": form_fields(subject, policy),
        }),
        ChannelTarget::Portal { url } => serde_json::json!({
            "channel": "portal",
            "url": url,
            "fields": form_fields(subject, policy),
        }),
        ChannelTarget::Api { url } => serde_json::json!({
            "channel": "api",
            "url": url,
            "body": api_body(subject, policy),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
