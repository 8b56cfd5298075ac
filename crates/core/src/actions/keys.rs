//! Key combination parsing for `Input.dispatchKeyEvent`.

use crate::error::{BridgeError, Result};

pub const MODIFIER_ALT: u32 = 1;
pub const MODIFIER_CONTROL: u32 = 2;
pub const MODIFIER_META: u32 = 4;
pub const MODIFIER_SHIFT: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
	pub key: String,
	pub code: String,
	pub key_code: u32,
	/// Character produced by the key, if any.
	pub text: Option<String>,
	/// Bit this key contributes to the modifier mask; 0 for ordinary keys.
	pub modifier_bit: u32,
}

impl KeyDefinition {
	fn new(key: &str, code: &str, key_code: u32, text: Option<&str>) -> Self {
		Self {
			key: key.to_string(),
			code: code.to_string(),
			key_code,
			text: text.map(str::to_owned),
			modifier_bit: 0,
		}
	}

	fn modifier(key: &str, code: &str, key_code: u32, bit: u32) -> Self {
		Self {
			modifier_bit: bit,
			..Self::new(key, code, key_code, None)
		}
	}
}

/// Modifiers in the order they were written, then the main key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
	pub modifiers: Vec<KeyDefinition>,
	pub key: KeyDefinition,
}

impl KeyCombo {
	/// Parses `"Enter"`, `"Control+Shift+R"`, `"Meta+a"`, `"Shift++"`.
	pub fn parse(combo: &str) -> Result<Self> {
		let combo = combo.trim();
		if combo.is_empty() {
			return Err(BridgeError::InvalidInput("key must not be empty".into()));
		}

		let (prefix, main) = if combo == "+" {
			("", "+")
		} else if let Some(prefix) = combo.strip_suffix("++") {
			(prefix, "+")
		} else {
			combo.rsplit_once('+').unwrap_or(("", combo))
		};

		let mut modifiers = Vec::new();
		for token in prefix.split('+').map(str::trim).filter(|t| !t.is_empty()) {
			let modifier = modifier(token)
				.ok_or_else(|| BridgeError::InvalidInput(format!("unknown modifier {token:?} in {combo:?}")))?;
			if !modifiers.contains(&modifier) {
				modifiers.push(modifier);
			}
		}

		let shift = modifiers.iter().any(|m| m.modifier_bit == MODIFIER_SHIFT);
		let key = match modifier(main.trim()) {
			Some(modifier) => modifier,
			None => key_definition(main.trim(), shift)
				.ok_or_else(|| BridgeError::InvalidInput(format!("unknown key {main:?} in {combo:?}")))?,
		};

		Ok(Self { modifiers, key })
	}

	/// Bitmask sent with every event of the combination.
	pub fn modifier_mask(&self) -> u32 {
		self.modifiers
			.iter()
			.chain(std::iter::once(&self.key))
			.fold(0, |mask, k| mask | k.modifier_bit)
	}
}

fn modifier(token: &str) -> Option<KeyDefinition> {
	let definition = match token.to_ascii_lowercase().as_str() {
		"alt" | "option" => KeyDefinition::modifier("Alt", "AltLeft", 18, MODIFIER_ALT),
		"control" | "ctrl" => KeyDefinition::modifier("Control", "ControlLeft", 17, MODIFIER_CONTROL),
		"meta" | "cmd" | "command" | "super" => KeyDefinition::modifier("Meta", "MetaLeft", 91, MODIFIER_META),
		"shift" => KeyDefinition::modifier("Shift", "ShiftLeft", 16, MODIFIER_SHIFT),
		_ => return None,
	};
	Some(definition)
}

fn key_definition(token: &str, shift: bool) -> Option<KeyDefinition> {
	let mut chars = token.chars();
	if let (Some(c), None) = (chars.next(), chars.next()) {
		return Some(char_definition(c, shift));
	}

	let definition = match token.to_ascii_lowercase().as_str() {
		"enter" | "return" => KeyDefinition::new("Enter", "Enter", 13, Some("\r")),
		"tab" => KeyDefinition::new("Tab", "Tab", 9, None),
		"escape" | "esc" => KeyDefinition::new("Escape", "Escape", 27, None),
		"backspace" => KeyDefinition::new("Backspace", "Backspace", 8, None),
		"delete" | "del" => KeyDefinition::new("Delete", "Delete", 46, None),
		"space" => KeyDefinition::new(" ", "Space", 32, Some(" ")),
		"arrowup" | "up" => KeyDefinition::new("ArrowUp", "ArrowUp", 38, None),
		"arrowdown" | "down" => KeyDefinition::new("ArrowDown", "ArrowDown", 40, None),
		"arrowleft" | "left" => KeyDefinition::new("ArrowLeft", "ArrowLeft", 37, None),
		"arrowright" | "right" => KeyDefinition::new("ArrowRight", "ArrowRight", 39, None),
		"home" => KeyDefinition::new("Home", "Home", 36, None),
		"end" => KeyDefinition::new("End", "End", 35, None),
		"pageup" => KeyDefinition::new("PageUp", "PageUp", 33, None),
		"pagedown" => KeyDefinition::new("PageDown", "PageDown", 34, None),
		"insert" => KeyDefinition::new("Insert", "Insert", 45, None),
		other => {
			let n: u32 = other.strip_prefix('f')?.parse().ok()?;
			if !(1..=12).contains(&n) {
				return None;
			}
			let name = format!("F{n}");
			KeyDefinition::new(&name, &name, 111 + n, None)
		}
	};
	Some(definition)
}

fn char_definition(c: char, shift: bool) -> KeyDefinition {
	if c.is_ascii_alphabetic() {
		let upper = c.to_ascii_uppercase();
		let key = (if shift { upper } else { c }).to_string();
		return KeyDefinition::new(&key, &format!("Key{upper}"), upper as u32, Some(&key));
	}
	if c.is_ascii_digit() {
		let key = c.to_string();
		return KeyDefinition::new(&key, &format!("Digit{c}"), c as u32, Some(&key));
	}

	let (code, key_code) = match c {
		' ' => ("Space", 32),
		'-' | '_' => ("Minus", 189),
		'=' | '+' => ("Equal", 187),
		',' | '<' => ("Comma", 188),
		'.' | '>' => ("Period", 190),
		'/' | '?' => ("Slash", 191),
		';' | ':' => ("Semicolon", 186),
		'\'' | '"' => ("Quote", 222),
		'[' | '{' => ("BracketLeft", 219),
		']' | '}' => ("BracketRight", 221),
		'\\' | '|' => ("Backslash", 220),
		'`' | '~' => ("Backquote", 192),
		_ => ("", 0),
	};
	let key = c.to_string();
	KeyDefinition::new(&key, code, key_code, Some(&key))
}
