//! Per-rig status-bar colours.

/// Status-bar colours applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub bg: &'static str,
    pub fg: &'static str,
}

impl Theme {
    /// Value for tmux's `status-style` option.
    pub fn status_style(&self) -> String {
        format!("bg={},fg={}", self.bg, self.fg)
    }
}

pub const PALETTE: &[Theme] = &[
    Theme { name: "ocean", bg: "#1e3a5f", fg: "#e0e0e0" },
    Theme { name: "forest", bg: "#2d5a3d", fg: "#e0e0e0" },
    Theme { name: "rust", bg: "#8b4513", fg: "#f5f5dc" },
    Theme { name: "plum", bg: "#4a3050", fg: "#e0e0e0" },
    Theme { name: "slate", bg: "#4a5568", fg: "#e2e8f0" },
    Theme { name: "ember", bg: "#b33a3a", fg: "#f5f5f5" },
    Theme { name: "midnight", bg: "#1a1a2e", fg: "#c0c0c0" },
    Theme { name: "wine", bg: "#722f37", fg: "#f5f5dc" },
    Theme { name: "teal", bg: "#0d5c63", fg: "#e0f2f1" },
    Theme { name: "copper", bg: "#6d4c41", fg: "#efebe9" },
];

/// Stable theme for `rig`: the same rig always gets the same colours.
pub fn assign_theme(rig: &str) -> Theme {
    let idx = (fnv1a(rig.as_bytes()) % PALETTE.len() as u64) as usize;
    PALETTE[idx]
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Left status segment naming who owns the session.
pub fn status_left(rig: &str, role: &str) -> String {
    format!(" [{rig}/{role}] ")
}
