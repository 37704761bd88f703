//! Per-message rule application for one filter.
//!
//! Rule order is fixed: title safeguard, order-id mask gate, status
//! search, extra-field extraction. The first two are gates that drop the
//! message; status and extras only enrich it. Status selection is
//! first-match-wins over the declared status order — declaration order is
//! the tie-break rule, not an accident of iteration.

use serde::Serialize;
use tracing::debug;

use crate::gmail::client::FetchedMessage;
use crate::mask::{CompiledMask, compile_entry_id_mask, compile_value_mask};
use crate::settings::model::{ExtraFieldSpec, Filter, OrderIdArea, StatusArea};

/// A captured extra-field value, destined for its own entry field.
#[derive(Debug, Clone, Serialize)]
pub struct ExtraValue {
    pub spec_id: String,
    pub code: String,
    pub entry_field_id: i64,
    /// Captured text; empty when the mask did not match.
    pub value: String,
}

/// One message that passed the filter's gates.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedItem {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub delivered_to: String,
    /// First matching status by declaration order; empty when none hit.
    pub status: String,
    /// Captured order-id digits; empty when the filter has no mask.
    pub entry_id: String,
    pub extras: Vec<ExtraValue>,
    pub body: String,
}

struct CompiledExtra {
    spec: ExtraFieldSpec,
    mask: CompiledMask,
}

/// A filter with its masks compiled once, applied to many messages.
pub struct FilterMatcher {
    title_filter: String,
    order_id_area: OrderIdArea,
    entry_id_mask: Option<CompiledMask>,
    status_areas: Vec<StatusArea>,
    statuses: Vec<String>,
    extras: Vec<CompiledExtra>,
}

impl FilterMatcher {
    pub fn new(filter: &Filter) -> Self {
        let extras = filter
            .extra_fields
            .iter()
            .filter_map(|spec| {
                compile_value_mask(&spec.mask).map(|mask| CompiledExtra {
                    spec: spec.clone(),
                    mask,
                })
            })
            .collect();

        Self {
            title_filter: filter.title_filter.trim().to_string(),
            order_id_area: filter.order_id_search_area,
            entry_id_mask: compile_entry_id_mask(&filter.mask),
            status_areas: filter.status_areas(),
            statuses: filter.statuses.clone(),
            extras,
        }
    }

    /// Apply the filter to one message. `None` means a gate rejected it;
    /// `Some` items may still carry an empty status or entry id.
    pub fn evaluate(&self, message: &FetchedMessage) -> Option<MatchedItem> {
        // Title safeguard — the query already constrains the subject
        // server-side, but server query semantics are not relied upon.
        if !self.title_filter.is_empty()
            && !contains_ignore_case(&message.subject, &self.title_filter)
        {
            return None;
        }

        // Order-id mask is a required gate when present, not optional
        // enrichment: a non-matching message is dropped entirely.
        let mut entry_id = String::new();
        if let Some(mask) = &self.entry_id_mask {
            let field_text = match self.order_id_area {
                OrderIdArea::To => {
                    if message.to.is_empty() {
                        &message.delivered_to
                    } else {
                        &message.to
                    }
                }
                OrderIdArea::From => &message.from,
                OrderIdArea::Subject => &message.subject,
            };
            if field_text.is_empty() {
                return None;
            }
            match mask.capture(field_text) {
                Some(captured) => entry_id = captured,
                None => {
                    debug!(message_id = %message.id, mask = %mask.raw, "Order-id mask did not match");
                    return None;
                }
            }
        }

        let status = self.match_status(message);
        let extras = self.extract_extras(message);

        Some(MatchedItem {
            message_id: message.id.clone(),
            subject: message.subject.clone(),
            from: message.from.clone(),
            delivered_to: message.delivered_to.clone(),
            status,
            entry_id,
            extras,
            body: message.body.clone(),
        })
    }

    /// First status (by declared order) found in any permitted area.
    fn match_status(&self, message: &FetchedMessage) -> String {
        for status in &self.statuses {
            let mut hit = self.status_areas.contains(&StatusArea::Subject)
                && contains_ignore_case(&message.subject, status);
            if !hit
                && self.status_areas.contains(&StatusArea::Body)
                && !message.body.is_empty()
            {
                hit = contains_ignore_case(&message.body, status);
            }
            if hit {
                return status.clone();
            }
        }
        String::new()
    }

    /// Extra-field extraction never rejects: no match records an empty
    /// value.
    fn extract_extras(&self, message: &FetchedMessage) -> Vec<ExtraValue> {
        self.extras
            .iter()
            .map(|extra| {
                let area_text = match extra.spec.search_area {
                    StatusArea::Subject => &message.subject,
                    StatusArea::Body => &message.body,
                };
                ExtraValue {
                    spec_id: extra.spec.id.clone(),
                    code: extra.spec.code.clone(),
                    entry_field_id: extra.spec.entry_field_id,
                    value: extra.mask.capture(area_text).unwrap_or_default(),
                }
            })
            .collect()
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
