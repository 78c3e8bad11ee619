use core::fmt;
use std::{fs, path::Path};

/// Location of the Linux sysfs network interface listing.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// The 6-byte node field of a version 1 UUID.
///
/// Populated once per process from the first non-loopback hardware interface,
/// then handed to the generator by value. It never changes afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId([u8; 6]);

impl NodeId {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Looks up the hardware address of the first non-loopback interface on
    /// this host.
    ///
    /// Returns `None` when no usable address exists (no sysfs, loopback only,
    /// or every address is all zeroes).
    pub fn discover() -> Option<Self> {
        Self::discover_in(Path::new(SYS_CLASS_NET))
    }

    /// Scans a sysfs-style directory where each entry is an interface holding
    /// an `address` file. Interfaces are visited in name order so the choice
    /// is stable across restarts.
    pub fn discover_in(dir: &Path) -> Option<Self> {
        let mut interfaces: Vec<_> = fs::read_dir(dir)
            .ok()?
            .filter_map(core::result::Result::ok)
            .filter(|entry| entry.file_name() != "lo")
            .map(|entry| entry.path())
            .collect();
        interfaces.sort();

        interfaces.iter().find_map(|iface| {
            let raw = fs::read_to_string(iface.join("address")).ok()?;
            let node = Self::parse(raw.trim())?;
            (!node.is_nil()).then_some(node)
        })
    }

    /// Parses a colon-separated hardware address such as `3c:22:fb:01:9a:7e`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut bytes = [0_u8; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts.next()?;
            if part.len() != 2 {
                return None;
            }
            *byte = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(bytes))
    }

    fn is_nil(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}
