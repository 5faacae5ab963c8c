//! Debug-option bitmask, gating `eprintln!` diagnostics exactly the way
//! `debug.h`/`main.cpp`'s `loadgen_debug` did.

/// Display enabled options at startup.
pub const D_OPTS: u32 = 0x0000_0001;
/// Display session commands received on the control channel.
pub const D_CMDS: u32 = 0x0000_0002;
/// Display thread start/stop events.
pub const D_THREADS: u32 = 0x0000_0004;
/// Display all file operations.
pub const D_FILES: u32 = 0x0000_0008;
/// Display all write operations.
pub const D_WRITES: u32 = 0x0000_0010;
/// Display verification operations.
pub const D_VERIFY: u32 = 0x0000_0020;
/// Display pacer sleeps.
pub const D_SLEEP: u32 = 0x0000_0080;
/// Show everything.
pub const D_ALL: u32 = 0x003f_ffff;

const TABLE: &[(char, &str, u32)] = &[
    ('O', "Options", D_OPTS),
    ('C', "Commands", D_CMDS),
    ('T', "Threads", D_THREADS),
    ('F', "Files", D_FILES),
    ('w', "writes", D_WRITES),
    ('v', "verify", D_VERIFY),
    ('s', "sleeps", D_SLEEP),
    ('A', "ALL", D_ALL),
];

/// Process-wide debug bitmask. Default matches the original's
/// `D_OPTS + D_CMDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugOpts(pub u32);

impl Default for DebugOpts {
    fn default() -> Self {
        DebugOpts(D_OPTS | D_CMDS)
    }
}

impl DebugOpts {
    pub fn enabled(&self, mask: u32) -> bool {
        self.0 & mask != 0
    }

    /// Parse a letters string (e.g. `"tf"`) into a bitmask, matching each
    /// letter against the first character of the option's descriptive
    /// name (case-sensitive, as the original did).
    pub fn parse(letters: &str) -> DebugOpts {
        let mut bits = 0u32;
        for c in letters.chars() {
            for &(letter, _, mask) in TABLE {
                if c == letter {
                    bits |= mask;
                }
            }
        }
        DebugOpts(bits)
    }

    /// Render the set bits back into a comma-separated descriptive string.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        for &(_, name, mask) in TABLE {
            if mask != D_ALL && self.0 & mask != 0 {
                parts.push(name);
            }
        }
        parts.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_original() {
        assert_eq!(DebugOpts::default().0, D_OPTS | D_CMDS);
    }

    #[test]
    fn parse_combines_letters() {
        let opts = DebugOpts::parse("TF");
        assert!(opts.enabled(D_THREADS));
        assert!(opts.enabled(D_FILES));
        assert!(!opts.enabled(D_WRITES));
    }

    #[test]
    fn describe_lists_enabled_names() {
        let opts = DebugOpts(D_THREADS | D_FILES);
        assert_eq!(opts.describe(), "Threads,Files");
    }
}
