use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CONTROL = 0b0010;
        const ALT = 0b0100;
        const META = 0b1000;
    }
}

// X11 key/button state bits.
const X_SHIFT: u16 = 1 << 0;
const X_CONTROL: u16 = 1 << 2;
const X_MOD1: u16 = 1 << 3;
const X_MOD4: u16 = 1 << 6;

impl Modifiers {
    /// Translate an X11 event state. Lock and NumLock (Mod2) are dropped so a
    /// binding fires regardless of them.
    pub fn from_x_state(state: u16) -> Self {
        let mut mods = Modifiers::empty();
        if state & X_SHIFT != 0 {
            mods.insert(Modifiers::SHIFT);
        }
        if state & X_CONTROL != 0 {
            mods.insert(Modifiers::CONTROL);
        }
        if state & X_MOD1 != 0 {
            mods.insert(Modifiers::ALT);
        }
        if state & X_MOD4 != 0 {
            mods.insert(Modifiers::META);
        }
        mods
    }

    pub fn to_x_mask(self) -> u16 {
        let mut mask = 0;
        if self.contains(Modifiers::SHIFT) {
            mask |= X_SHIFT;
        }
        if self.contains(Modifiers::CONTROL) {
            mask |= X_CONTROL;
        }
        if self.contains(Modifiers::ALT) {
            mask |= X_MOD1;
        }
        if self.contains(Modifiers::META) {
            mask |= X_MOD4;
        }
        mask
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if self.contains(Modifiers::CONTROL) {
            parts.push("Ctrl");
        }
        if self.contains(Modifiers::ALT) {
            parts.push("Alt");
        }
        if self.contains(Modifiers::SHIFT) {
            parts.push("Shift");
        }
        if self.contains(Modifiers::META) {
            parts.push("Meta");
        }
        write!(f, "{}", parts.join(" + "))
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KeyCode {
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
    KeyG,
    KeyH,
    KeyI,
    KeyJ,
    KeyK,
    KeyL,
    KeyM,
    KeyN,
    KeyO,
    KeyP,
    KeyQ,
    KeyR,
    KeyS,
    KeyT,
    KeyU,
    KeyV,
    KeyW,
    KeyX,
    KeyY,
    KeyZ,
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    Enter,
    Tab,
    Space,
    Escape,
    Backspace,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

const LETTERS: [KeyCode; 26] = {
    use KeyCode::*;
    [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN, KeyO,
        KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ]
};

const DIGITS: [KeyCode; 10] = {
    use KeyCode::*;
    [Digit0, Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9]
};

const FUNCTION_KEYS: [KeyCode; 12] = {
    use KeyCode::*;
    [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12]
};

// Latin-1 and TTY keysyms from X11/keysymdef.h.
const XK_A_LOWER: u32 = 0x0061;
const XK_A_UPPER: u32 = 0x0041;
const XK_0: u32 = 0x0030;
const XK_F1: u32 = 0xffbe;
const XK_RETURN: u32 = 0xff0d;
const XK_KP_ENTER: u32 = 0xff8d;
const XK_TAB: u32 = 0xff09;
const XK_SPACE: u32 = 0x0020;
const XK_ESCAPE: u32 = 0xff1b;
const XK_BACKSPACE: u32 = 0xff08;
const XK_LEFT: u32 = 0xff51;
const XK_UP: u32 = 0xff52;
const XK_RIGHT: u32 = 0xff53;
const XK_DOWN: u32 = 0xff54;

impl KeyCode {
    /// The unshifted keysym used to look up a keycode for grabbing.
    pub fn keysym(self) -> u32 {
        use KeyCode::*;
        if let Some(i) = LETTERS.iter().position(|&k| k == self) {
            return XK_A_LOWER + i as u32;
        }
        if let Some(i) = DIGITS.iter().position(|&k| k == self) {
            return XK_0 + i as u32;
        }
        if let Some(i) = FUNCTION_KEYS.iter().position(|&k| k == self) {
            return XK_F1 + i as u32;
        }
        match self {
            Enter => XK_RETURN,
            Tab => XK_TAB,
            Space => XK_SPACE,
            Escape => XK_ESCAPE,
            Backspace => XK_BACKSPACE,
            ArrowLeft => XK_LEFT,
            ArrowRight => XK_RIGHT,
            ArrowUp => XK_UP,
            ArrowDown => XK_DOWN,
            _ => unreachable!("every letter, digit and function key is handled above"),
        }
    }

    pub fn from_keysym(keysym: u32) -> Option<KeyCode> {
        use KeyCode::*;
        let key = match keysym {
            k if (XK_A_LOWER..XK_A_LOWER + 26).contains(&k) => {
                LETTERS[(k - XK_A_LOWER) as usize]
            }
            k if (XK_A_UPPER..XK_A_UPPER + 26).contains(&k) => {
                LETTERS[(k - XK_A_UPPER) as usize]
            }
            k if (XK_0..XK_0 + 10).contains(&k) => DIGITS[(k - XK_0) as usize],
            k if (XK_F1..XK_F1 + 12).contains(&k) => FUNCTION_KEYS[(k - XK_F1) as usize],
            XK_RETURN | XK_KP_ENTER => Enter,
            XK_TAB => Tab,
            XK_SPACE => Space,
            XK_ESCAPE => Escape,
            XK_BACKSPACE => Backspace,
            XK_LEFT => ArrowLeft,
            XK_RIGHT => ArrowRight,
            XK_UP => ArrowUp,
            XK_DOWN => ArrowDown,
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use KeyCode::*;
        if let Some(i) = LETTERS.iter().position(|k| k == self) {
            return write!(f, "{}", (b'A' + i as u8) as char);
        }
        if let Some(i) = DIGITS.iter().position(|k| k == self) {
            return write!(f, "{i}");
        }
        if let Some(i) = FUNCTION_KEYS.iter().position(|k| k == self) {
            return write!(f, "F{}", i + 1);
        }
        let s = match self {
            Enter => "Enter",
            Tab => "Tab",
            Space => "Space",
            Escape => "Escape",
            Backspace => "Backspace",
            ArrowLeft => "Left",
            ArrowRight => "Right",
            ArrowUp => "Up",
            ArrowDown => "Down",
            _ => "Other",
        };
        write!(f, "{}", s)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key_code: KeyCode,
}

impl Hotkey {
    pub fn new(modifiers: Modifiers, key_code: KeyCode) -> Self { Self { modifiers, key_code } }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key_code)
        } else {
            write!(f, "{} + {}", self.modifiers, self.key_code)
        }
    }
}

impl FromStr for Hotkey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
        let mut mods = Modifiers::empty();
        let mut key_opt: Option<KeyCode> = None;

        for part in parts {
            match part.to_lowercase().as_str() {
                "alt" | "mod1" => mods.insert(Modifiers::ALT),
                "ctrl" | "control" => mods.insert(Modifiers::CONTROL),
                "shift" => mods.insert(Modifiers::SHIFT),
                "meta" | "super" | "mod4" | "win" => mods.insert(Modifiers::META),
                k => {
                    if key_opt.is_some() {
                        return Err(anyhow::anyhow!("More than one key in hotkey: {}", s));
                    }
                    let upper = k.to_uppercase();
                    let code = match upper.as_str() {
                        "ENTER" | "RETURN" => KeyCode::Enter,
                        "TAB" => KeyCode::Tab,
                        "SPACE" => KeyCode::Space,
                        "ESC" | "ESCAPE" => KeyCode::Escape,
                        "BACKSPACE" => KeyCode::Backspace,
                        "LEFT" | "ARROWLEFT" => KeyCode::ArrowLeft,
                        "RIGHT" | "ARROWRIGHT" => KeyCode::ArrowRight,
                        "UP" | "ARROWUP" => KeyCode::ArrowUp,
                        "DOWN" | "ARROWDOWN" => KeyCode::ArrowDown,
                        other => parse_single_key(other)
                            .ok_or_else(|| anyhow::anyhow!("Unrecognized key token: {}", k))?,
                    };
                    key_opt = Some(code);
                }
            }
        }

        let key_code =
            key_opt.ok_or_else(|| anyhow::anyhow!("No key specified in hotkey: {}", s))?;
        Ok(Hotkey::new(mods, key_code))
    }
}

fn parse_single_key(token: &str) -> Option<KeyCode> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Some(LETTERS[(c as u8 - b'A') as usize]),
        (Some(c), None) if c.is_ascii_digit() => Some(DIGITS[(c as u8 - b'0') as usize]),
        (Some('F'), Some(_)) => {
            let n: usize = token[1..].parse().ok()?;
            FUNCTION_KEYS.get(n.checked_sub(1)?).copied()
        }
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Hotkey {
    fn deserialize<D>(deserializer: D) -> Result<Hotkey, D::Error>
    where D: serde::Deserializer<'de> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum HotkeyRepr {
            Str(String),
            Map {
                modifiers: Modifiers,
                key_code: KeyCode,
            },
        }

        let repr = HotkeyRepr::deserialize(deserializer)?;
        match repr {
            HotkeyRepr::Str(s) => Hotkey::from_str(&s).map_err(serde::de::Error::custom),
            HotkeyRepr::Map { modifiers, key_code } => Ok(Hotkey::new(modifiers, key_code)),
        }
    }
}
