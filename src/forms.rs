//! Server-driven forms.
//!
//! Showing a form stores its continuation and returns immediately. The
//! continuation runs on the main loop once the client answers, closes the
//! form, or leaves; there is no timeout.

use std::collections::{HashMap, VecDeque};

use bevy::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::components::Player;
use crate::error::FormError;

pub type FormId = u32;

/// The player closed the form (or left) without submitting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormClosed;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModalElement {
    Label {
        text: String,
    },
    Input {
        text: String,
        placeholder: String,
        default: String,
    },
    Slider {
        text: String,
        min: f32,
        max: f32,
        step: f32,
        default: f32,
    },
}

/// A form of labelled inputs answered with one value per element.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModalForm {
    pub title: String,
    #[serde(rename = "content")]
    pub elements: Vec<ModalElement>,
}

impl ModalForm {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: Vec::new(),
        }
    }

    pub fn label(mut self, text: impl Into<String>) -> Self {
        self.elements.push(ModalElement::Label { text: text.into() });
        self
    }

    pub fn input(mut self, text: impl Into<String>, default: impl Into<String>) -> Self {
        let default = default.into();
        self.elements.push(ModalElement::Input {
            text: text.into(),
            placeholder: default.clone(),
            default,
        });
        self
    }

    pub fn slider(mut self, text: impl Into<String>, min: f32, max: f32, default: f32) -> Self {
        self.elements.push(ModalElement::Slider {
            text: text.into(),
            min,
            max,
            step: 1.0,
            default,
        });
        self
    }

    pub fn show<F>(self, world: &mut World, player: Entity, on_response: F) -> FormId
    where
        F: FnOnce(&mut World, Result<ModalResponse, FormClosed>) + Send + Sync + 'static,
    {
        let expected = ExpectedReply::Values(self.elements.len());
        let payload = form_payload("custom_form", &self);
        let resume: Resume = Box::new(
            move |world: &mut World, reply: Result<RawReply, FormClosed>| {
                let response = match reply {
                    Ok(RawReply::Values(values)) => Ok(ModalResponse(values)),
                    Ok(RawReply::Button(_)) | Err(FormClosed) => Err(FormClosed),
                };
                on_response(world, response);
            },
        );
        world
            .resource_mut::<FormTransport>()
            .open(player, payload, expected, resume)
    }
}

/// A list of buttons answered with the index of the one pressed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionForm {
    pub title: String,
    pub content: String,
    pub buttons: Vec<ActionButton>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionButton {
    pub text: String,
}

impl ActionForm {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            buttons: Vec::new(),
        }
    }

    pub fn button(mut self, text: impl Into<String>) -> Self {
        self.buttons.push(ActionButton { text: text.into() });
        self
    }

    pub fn show<F>(self, world: &mut World, player: Entity, on_response: F) -> FormId
    where
        F: FnOnce(&mut World, Result<usize, FormClosed>) + Send + Sync + 'static,
    {
        let expected = ExpectedReply::Button(self.buttons.len());
        let payload = form_payload("form", &self);
        let resume: Resume = Box::new(
            move |world: &mut World, reply: Result<RawReply, FormClosed>| {
                let response = match reply {
                    Ok(RawReply::Button(index)) => Ok(index),
                    Ok(RawReply::Values(_)) | Err(FormClosed) => Err(FormClosed),
                };
                on_response(world, response);
            },
        );
        world
            .resource_mut::<FormTransport>()
            .open(player, payload, expected, resume)
    }
}

/// Submitted modal values, index-aligned with the form's elements (labels are `null`).
#[derive(Clone, Debug, PartialEq)]
pub struct ModalResponse(Vec<Value>);

impl ModalResponse {
    pub fn text(&self, index: usize) -> Option<&str> {
        self.0.get(index)?.as_str()
    }

    pub fn number(&self, index: usize) -> Option<f32> {
        self.0.get(index)?.as_f64().map(|n| n as f32)
    }
}

fn form_payload<T: Serialize>(kind: &str, form: &T) -> Value {
    let mut payload = serde_json::to_value(form).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut payload {
        map.insert("type".to_string(), Value::String(kind.to_string()));
    }
    payload
}

enum RawReply {
    Values(Vec<Value>),
    Button(usize),
}

#[derive(Clone, Copy, Debug)]
enum ExpectedReply {
    Values(usize),
    Button(usize),
}

impl ExpectedReply {
    fn parse(self, raw: &str) -> Result<Option<RawReply>, String> {
        let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if value.is_null() {
            return Ok(None);
        }
        match self {
            ExpectedReply::Values(len) => match value {
                Value::Array(values) if values.len() == len => Ok(Some(RawReply::Values(values))),
                Value::Array(values) => {
                    Err(format!("expected {len} values, got {}", values.len()))
                }
                other => Err(format!("expected an array, got {other}")),
            },
            ExpectedReply::Button(count) => match value.as_u64() {
                Some(index) if (index as usize) < count => {
                    Ok(Some(RawReply::Button(index as usize)))
                }
                Some(index) => Err(format!("button {index} out of range ({count} buttons)")),
                None => Err(format!("expected a button index, got {value}")),
            },
        }
    }
}

type Resume = Box<dyn FnOnce(&mut World, Result<RawReply, FormClosed>) + Send + Sync>;

struct PendingForm {
    expected: ExpectedReply,
    resume: Resume,
}

/// A form waiting to be delivered to a client.
#[derive(Clone, Debug)]
pub struct OutboundForm {
    pub player: Entity,
    pub id: FormId,
    pub payload: Value,
}

#[derive(Resource, Default)]
pub struct FormTransport {
    next_id: FormId,
    pending: HashMap<(Entity, FormId), PendingForm>,
    pub outbound: VecDeque<OutboundForm>,
}

impl FormTransport {
    fn open(
        &mut self,
        player: Entity,
        payload: Value,
        expected: ExpectedReply,
        resume: Resume,
    ) -> FormId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.insert((player, id), PendingForm { expected, resume });
        self.outbound.push_back(OutboundForm { player, id, payload });
        id
    }

    pub fn is_pending(&self, player: Entity, id: FormId) -> bool {
        self.pending.contains_key(&(player, id))
    }
}

#[cfg(test)]
impl FormTransport {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn latest_for(&self, player: Entity) -> Option<&OutboundForm> {
        self.outbound.iter().rev().find(|f| f.player == player)
    }
}

/// A client's answer to a form. `data` is the raw JSON reply; `None` means closed.
#[derive(Event, Clone, Debug)]
pub struct FormReplyEvent {
    pub player: Entity,
    pub id: FormId,
    pub data: Option<String>,
}

/// Resolves a pending form and runs its continuation. Malformed replies are
/// treated as the player closing the form.
pub fn respond(
    world: &mut World,
    player: Entity,
    id: FormId,
    data: Option<&str>,
) -> Result<(), FormError> {
    let pending = world
        .resource_mut::<FormTransport>()
        .pending
        .remove(&(player, id))
        .ok_or(FormError::UnknownForm(id))?;

    let reply = match data.map(|raw| pending.expected.parse(raw)) {
        None | Some(Ok(None)) => Err(FormClosed),
        Some(Ok(Some(reply))) => Ok(reply),
        Some(Err(reason)) => {
            warn!("[Slapper forms] Malformed reply to form {id} from {player:?}: {reason}");
            Err(FormClosed)
        }
    };
    (pending.resume)(world, reply);
    Ok(())
}

pub fn resolve_form_replies(world: &mut World) {
    let replies: Vec<FormReplyEvent> = match world.get_resource_mut::<Events<FormReplyEvent>>() {
        Some(mut events) => events.drain().collect(),
        None => return,
    };
    for reply in replies {
        if let Err(err) = respond(world, reply.player, reply.id, reply.data.as_deref()) {
            warn!("[Slapper forms] Ignoring reply from {:?}: {err}", reply.player);
        }
    }
}

/// Closes forms whose player is gone so their continuations still run.
pub fn cancel_orphaned_forms(world: &mut World) {
    let orphaned: Vec<(Entity, FormId)> = world
        .resource::<FormTransport>()
        .pending
        .keys()
        .filter(|(player, _)| world.get::<Player>(*player).is_none())
        .copied()
        .collect();
    for (player, id) in orphaned {
        debug!("[Slapper forms] Closing form {id} for departed player {player:?}");
        if let Err(err) = respond(world, player, id, None) {
            warn!("[Slapper forms] Failed to close form {id} for {player:?}: {err}");
        }
    }
}
