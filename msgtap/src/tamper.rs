//! Active interception of in-flight messages, keyed by name and direction.
//!
//! When no rule is enabled the per-packet cost is a single boolean check.
//! With rules armed, every packet pays one name-only decode; only packets
//! whose name and direction match an enabled rule pay the full decode and
//! the handler callback. No interception state survives a single call.

use crate::pretty::{decode_name, Direction, PrettyMessage};
use crate::template::TemplateCodec;
use msgtap_common::{Host, MessageKind, RawEntry};
use std::collections::HashMap;

/// Handler invoked with the full dump text and the destination host of a
/// matched message, before the original send proceeds.
pub type TamperCallback = Box<dyn FnMut(&str, &Host) + Send>;

/// Per-name direction flags. An absent registry entry is equivalent to
/// both flags clear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TamperRule {
    pub inbound: bool,
    pub outbound: bool,
}

impl TamperRule {
    fn is_clear(&self) -> bool {
        !self.inbound && !self.outbound
    }
}

/// Rule registry plus the interception entry point.
pub struct MessageTamperer {
    rules: HashMap<String, TamperRule>,
    any_enabled: bool,
    callback: Option<TamperCallback>,
    listen_port: u16,
}

impl MessageTamperer {
    pub fn new(listen_port: u16) -> Self {
        Self {
            rules: HashMap::new(),
            any_enabled: false,
            callback: None,
            listen_port,
        }
    }

    pub fn set_callback(&mut self, callback: Option<TamperCallback>) {
        self.callback = callback;
    }

    pub fn enable_inbound(&mut self, name: &str) {
        self.rules.entry(name.to_string()).or_default().inbound = true;
        self.recount();
    }

    pub fn enable_outbound(&mut self, name: &str) {
        self.rules.entry(name.to_string()).or_default().outbound = true;
        self.recount();
    }

    pub fn disable_inbound(&mut self, name: &str) {
        if let Some(rule) = self.rules.get_mut(name) {
            rule.inbound = false;
        }
        self.recount();
    }

    pub fn disable_outbound(&mut self, name: &str) {
        if let Some(rule) = self.rules.get_mut(name) {
            rule.outbound = false;
        }
        self.recount();
    }

    pub fn is_tampered(&self, name: &str, outbound: bool) -> bool {
        match self.rules.get(name) {
            Some(rule) if outbound => rule.outbound,
            Some(rule) => rule.inbound,
            None => false,
        }
    }

    /// Fast-exit gate for the hot packet path.
    pub fn is_anything_tampered(&self) -> bool {
        self.any_enabled
    }

    /// Inspects one in-flight packet. Returns true iff the handler was
    /// invoked. The codec is expected to be the long-lived instance this
    /// tamperer always uses; it is reset internally before every decode.
    pub fn tamper(
        &mut self,
        codec: &mut dyn TemplateCodec,
        from: Host,
        to: Host,
        payload: &[u8],
    ) -> bool {
        if !self.any_enabled || self.callback.is_none() {
            return false;
        }
        if payload.is_empty() {
            return false;
        }
        let entry = RawEntry::new(MessageKind::Template, from, to, payload);

        // name-keyed matching: unparsed traffic cannot be matched
        let Some(name) = decode_name(codec, &entry) else {
            return false;
        };

        let outbound = Direction::of(&entry.from, self.listen_port) == Direction::Outgoing;
        if !self.is_tampered(&name, outbound) {
            return false;
        }

        let pretty = PrettyMessage::decode(&entry, codec, self.listen_port);
        let full = pretty.full(codec, true);
        if let Some(callback) = self.callback.as_mut() {
            callback(&full, &entry.to);
        }
        true
    }

    /// Recomputed whenever any rule changes so the hot path can skip all
    /// work with one boolean check.
    fn recount(&mut self) {
        self.any_enabled = self.rules.values().any(|rule| !rule.is_clear());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_rule_means_no_tampering() {
        let tamperer = MessageTamperer::new(13000);
        assert!(!tamperer.is_tampered("Foo", true));
        assert!(!tamperer.is_tampered("Foo", false));
        assert!(!tamperer.is_anything_tampered());
    }

    #[test]
    fn test_enable_disable_round_trip() {
        let mut tamperer = MessageTamperer::new(13000);
        tamperer.enable_outbound("Foo");
        assert!(tamperer.is_tampered("Foo", true));
        assert!(!tamperer.is_tampered("Foo", false));
        assert!(tamperer.is_anything_tampered());

        tamperer.disable_outbound("Foo");
        assert!(!tamperer.is_tampered("Foo", true));
        assert!(
            !tamperer.is_anything_tampered(),
            "gate must clear once the last rule is disabled"
        );
    }

    #[test]
    fn test_direction_bits_are_independent() {
        let mut tamperer = MessageTamperer::new(13000);
        tamperer.enable_inbound("Foo");
        tamperer.enable_outbound("Foo");
        tamperer.disable_inbound("Foo");
        assert!(tamperer.is_tampered("Foo", true));
        assert!(!tamperer.is_tampered("Foo", false));
        assert!(tamperer.is_anything_tampered());
    }
}
