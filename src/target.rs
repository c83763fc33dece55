//! Target platform and host selection, and the ABI facts codegen needs.

use std::fmt;

/// The closed set of code-generation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    X86_64,
    Arm64,
    /// Accepted as a selectable value but has no back-end implementation.
    Z80,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::X86_64 => "x86_64",
            Platform::Arm64 => "arm64",
            Platform::Z80 => "z80",
        };
        write!(f, "{}", s)
    }
}

/// The host operating system, which changes syscall numbers, section
/// directives, and symbol naming (`main` vs `_start` name mangling on
/// Darwin).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Host {
    Linux,
    Darwin,
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Host::Linux => "linux",
            Host::Darwin => "darwin",
        };
        write!(f, "{}", s)
    }
}

/// ABI facts a back-end needs: pointer width, stack alignment boundary,
/// and whether global symbols get a leading underscore (Darwin's Mach-O
/// convention).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetConfig {
    pub platform: Platform,
    pub host: Host,
    pub pointer_width: u32,
    pub stack_alignment: u32,
    pub leading_underscore: bool,
}

impl TargetConfig {
    pub fn resolve(platform: Platform, host: Host) -> Result<Self, crate::error::CompileError> {
        if platform == Platform::Z80 {
            return Err(crate::error::CompileError::runtime(
                "the z80 platform has no code-generation back-end",
                "z80",
            ));
        }
        let pointer_width = 8;
        let stack_alignment = 16;
        let leading_underscore = host == Host::Darwin;
        Ok(Self {
            platform,
            host,
            pointer_width,
            stack_alignment,
            leading_underscore,
        })
    }

    /// Mach-O and most BSD assemblers prefix global symbols with `_`; ELF
    /// (Linux) does not.
    pub fn symbol_name(&self, name: &str) -> String {
        if self.leading_underscore {
            format!("_{}", name)
        } else {
            name.to_string()
        }
    }

    /// The entry symbol a freestanding `main` is renamed to at link time.
    pub fn entry_symbol(&self) -> &'static str {
        "_start"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z80_is_rejected_at_resolve_time() {
        assert!(TargetConfig::resolve(Platform::Z80, Host::Linux).is_err());
    }

    #[test]
    fn darwin_symbols_get_leading_underscore() {
        let cfg = TargetConfig::resolve(Platform::X86_64, Host::Darwin).unwrap();
        assert_eq!(cfg.symbol_name("main"), "_main");
    }

    #[test]
    fn linux_symbols_are_unprefixed() {
        let cfg = TargetConfig::resolve(Platform::Arm64, Host::Linux).unwrap();
        assert_eq!(cfg.symbol_name("main"), "main");
    }
}
