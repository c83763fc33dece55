//! Syscall numbers and the `exit` sequence each back-end's `LEAVE`
//! handling emits for `main`, per platform/host ABI.
//!
//! Grounded in the original source's syscall table header: Linux x86-64
//! numbers `read=0, write=1, open=2, close=3, exit=60, brk=12`; Darwin
//! x86-64 numbers are the same table OR'd with `0x2000000`; ARM64 Linux
//! uses its own AArch64 EABI numbers (`exit=93`) with the syscall number
//! in `x8` and `svc #0`; ARM64 Darwin keeps the x86-64-style BSD numbers
//! with the number in `x16` and `svc #0x80`.

use crate::target::{Host, Platform};

/// A named syscall this back-end's runtime layer knows how to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    Read,
    Write,
    Open,
    Close,
    Exit,
    Brk,
}

/// The raw syscall number for `call` on `platform`/`host`.
pub fn syscall_number(call: Syscall, platform: Platform, host: Host) -> i64 {
    match platform {
        Platform::X86_64 => {
            let linux = match call {
                Syscall::Read => 0,
                Syscall::Write => 1,
                Syscall::Open => 2,
                Syscall::Close => 3,
                Syscall::Exit => 60,
                Syscall::Brk => 12,
            };
            match host {
                Host::Linux => linux,
                Host::Darwin => linux | 0x2000000,
            }
        }
        Platform::Arm64 => match host {
            Host::Linux => match call {
                Syscall::Read => 63,
                Syscall::Write => 64,
                Syscall::Open => 1024,
                Syscall::Close => 57,
                Syscall::Exit => 93,
                Syscall::Brk => 214,
            },
            Host::Darwin => match call {
                Syscall::Read => 3,
                Syscall::Write => 4,
                Syscall::Open => 5,
                Syscall::Close => 6,
                Syscall::Exit => 1,
                Syscall::Brk => 17,
            },
        },
        Platform::Z80 => 0,
    }
}

/// The register that carries the syscall number on entry to the kernel.
pub fn syscall_number_register(platform: Platform, host: Host) -> &'static str {
    match platform {
        Platform::X86_64 => "rax",
        Platform::Arm64 => match host {
            Host::Linux => "x8",
            Host::Darwin => "x16",
        },
        Platform::Z80 => "",
    }
}

/// The instruction text that actually traps into the kernel.
pub fn syscall_instruction(platform: Platform, host: Host) -> &'static str {
    match platform {
        Platform::X86_64 => "syscall",
        Platform::Arm64 => match host {
            Host::Linux => "svc #0",
            Host::Darwin => "svc #0x80",
        },
        Platform::Z80 => "",
    }
}

/// The full `exit(status)` instruction sequence for `platform`/`host`,
/// used by `main`'s epilogue instead of an ordinary function return.
pub fn exit_sequence(platform: Platform, host: Host, status: i64) -> Vec<String> {
    let number = syscall_number(Syscall::Exit, platform, host);
    match platform {
        Platform::X86_64 => vec![
            format!("    mov rax, {}", number),
            format!("    mov rdi, {}", status),
            "    syscall".to_string(),
        ],
        Platform::Arm64 => {
            let num_reg = syscall_number_register(platform, host);
            vec![
                format!("    mov {}, #{}", num_reg, number),
                format!("    mov x0, #{}", status),
                format!("    {}", syscall_instruction(platform, host)),
            ]
        }
        Platform::Z80 => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_linux_exit_is_syscall_60() {
        assert_eq!(syscall_number(Syscall::Exit, Platform::X86_64, Host::Linux), 60);
    }

    #[test]
    fn x86_64_darwin_exit_is_ored_with_bsd_class() {
        let n = syscall_number(Syscall::Exit, Platform::X86_64, Host::Darwin);
        assert_eq!(n, 60 | 0x2000000);
    }

    #[test]
    fn arm64_linux_exit_is_93() {
        assert_eq!(syscall_number(Syscall::Exit, Platform::Arm64, Host::Linux), 93);
    }

    #[test]
    fn arm64_darwin_uses_x16_and_svc_0x80() {
        assert_eq!(syscall_number_register(Platform::Arm64, Host::Darwin), "x16");
        assert_eq!(syscall_instruction(Platform::Arm64, Host::Darwin), "svc #0x80");
    }

    #[test]
    fn x86_64_linux_exit_sequence_matches_worked_example() {
        let seq = exit_sequence(Platform::X86_64, Host::Linux, 0);
        assert_eq!(seq, vec!["    mov rax, 60", "    mov rdi, 0", "    syscall"]);
    }

    #[test]
    fn x86_64_darwin_exit_sequence_uses_ored_number() {
        let seq = exit_sequence(Platform::X86_64, Host::Darwin, 0);
        assert_eq!(seq[0], format!("    mov rax, {}", 60 | 0x2000000));
    }

    #[test]
    fn arm64_linux_exit_sequence_uses_x8_and_svc_0() {
        let seq = exit_sequence(Platform::Arm64, Host::Linux, 0);
        assert_eq!(seq, vec!["    mov x8, #93", "    mov x0, #0", "    svc #0"]);
    }
}
