// SPDX-License-Identifier: MIT

//! Windows Argument Quoting Rules
//!
//! `CreateProcessW` takes a single command line string which the child splits
//! again with the MSVC runtime rules.  The standard library keeps its quoting
//! private, so it lives here.
//!
//! See "Everyone quotes command line arguments the wrong way":
//!   https://learn.microsoft.com/en-us/archive/blogs/twistylittlepassagesallalike/everyone-quotes-command-line-arguments-the-wrong-way
//!
//! The first argument is the program name, traditionally passed as arg 0.

use crate::runtime::error::{Result, SandboxError};

/// Quote the arguments into a NUL terminated UTF-16 command line.
pub fn quote_arguments<S: AsRef<str>>(args: &[S]) -> Result<Vec<u16>> {
    let mut ret = vec![];
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            ret.push(' ' as u16);
        }
        append_arg(&mut ret, arg.as_ref())?;
    }
    ret.push(0); // NUL terminator
    Ok(ret)
}

fn append_arg(cmd: &mut Vec<u16>, arg: &str) -> Result<()> {
    if arg.contains('\0') {
        return Err(SandboxError::Process(format!("nul character found in argument {arg:?}")));
    }
    if !requires_quoting(arg) {
        cmd.extend(arg.encode_utf16());
        return Ok(());
    }

    cmd.push('"' as u16);
    let mut backslash_count = 0;
    for c in arg.encode_utf16() {
        if c == '\\' as u16 {
            backslash_count += 1;
            continue;
        }
        if c == '"' as u16 {
            // Escape all the backslashes, and add one for the escaped '"'.
            push_backslashes(cmd, backslash_count * 2 + 1);
        } else {
            // Backslashes aren't special here.
            push_backslashes(cmd, backslash_count);
        }
        cmd.push(c);
        backslash_count = 0;
    }

    // Trailing backslashes are doubled so the closing '"' stays a meta-character.
    push_backslashes(cmd, backslash_count * 2);
    cmd.push('"' as u16);
    Ok(())
}

fn push_backslashes(cmd: &mut Vec<u16>, count: usize) {
    cmd.extend(std::iter::repeat_n('\\' as u16, count));
}

fn requires_quoting(val: &str) -> bool {
    val.is_empty() || val.chars().any(|c| matches!(c, ' ' | '\t' | '\n' | '\u{0b}' | '"'))
}
