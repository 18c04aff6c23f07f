//! Text command surface of the control interface:
//!
//! ```text
//! table <id> add <addr>[/<masklen>] [<value>]
//! table <id> delete <addr>[/<masklen>]
//! table <id|all> flush
//! table <id|all> list
//! table <id> lookup <addr>
//! ```

use crate::constants::MAX_TABLES;
use crate::errors::Error;
use crate::helpers::{parse_addr, parse_cidr};
use crate::table_set::{TableId, TableSet};
use std::fmt::Write;
use std::str::FromStr;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Target {
    One(TableId),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        table: TableId,
        prefix: u32,
        masklen: u8,
        value: u32,
    },
    Delete {
        table: TableId,
        prefix: u32,
        masklen: u8,
    },
    Flush(Target),
    List(Target),
    Lookup {
        table: TableId,
        addr: u32,
    },
}

fn syntax(msg: impl Into<String>) -> Error {
    Error::Syntax(msg.into())
}

fn parse_target(s: &str) -> Result<Target, Error> {
    if s == "all" {
        return Ok(Target::All);
    }
    let n: u32 = s
        .parse()
        .map_err(|_| syntax(format!("bad table number `{s}`")))?;
    if n as usize >= MAX_TABLES {
        return Err(Error::InvalidTableId(n));
    }
    Ok(Target::One(n as TableId))
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Error> {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("table") => {}
            Some(w) => return Err(syntax(format!("unknown command `{w}`"))),
            None => return Err(syntax("empty command")),
        }
        let target = parse_target(words.next().ok_or_else(|| syntax("table number expected"))?)?;
        let verb = words.next().ok_or_else(|| syntax("action expected"))?;
        let args: Vec<&str> = words.collect();

        let one = |verb: &str| match target {
            Target::One(id) => Ok(id),
            Target::All => Err(syntax(format!("`{verb}` needs a table number"))),
        };

        let cmd = match (verb, args.as_slice()) {
            ("add", [cidr, rest @ ..]) if rest.len() <= 1 => {
                let (prefix, masklen) = parse_cidr(cidr)?;
                let value = match rest.first() {
                    Some(v) => v.parse().map_err(|_| syntax(format!("bad value `{v}`")))?,
                    None => 0,
                };
                Command::Add {
                    table: one(verb)?,
                    prefix,
                    masklen,
                    value,
                }
            }
            ("delete", [cidr]) => {
                let (prefix, masklen) = parse_cidr(cidr)?;
                Command::Delete {
                    table: one(verb)?,
                    prefix,
                    masklen,
                }
            }
            ("flush", []) => Command::Flush(target),
            ("list", []) => Command::List(target),
            ("lookup", [addr]) => Command::Lookup {
                table: one(verb)?,
                addr: parse_addr(addr)?,
            },
            ("add" | "delete" | "flush" | "list" | "lookup", _) => {
                return Err(syntax(format!("wrong arguments for `{verb}`")))
            }
            _ => return Err(syntax(format!("unknown action `{verb}`"))),
        };
        Ok(cmd)
    }
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, Error> {
        line.parse()
    }

    /// Run against `set`, returning whatever the command prints.
    pub fn execute(&self, set: &TableSet) -> Result<String, Error> {
        let mut out = String::new();
        match *self {
            Command::Add {
                table,
                prefix,
                masklen,
                value,
            } => set.add(table, prefix, masklen, value)?,
            Command::Delete {
                table,
                prefix,
                masklen,
            } => {
                set.delete(table, prefix, masklen)?;
            }
            Command::Flush(Target::One(table)) => {
                set.flush(table)?;
            }
            Command::Flush(Target::All) => {
                set.flush_all();
            }
            Command::List(Target::One(table)) => {
                for e in set.dump(table)? {
                    let _ = writeln!(out, "{e}");
                }
            }
            Command::List(Target::All) => {
                for t in set.tables() {
                    let entries = t.dump();
                    if entries.is_empty() {
                        continue;
                    }
                    let _ = writeln!(out, "---table({})---", t.id());
                    for e in entries {
                        let _ = writeln!(out, "{e}");
                    }
                }
            }
            Command::Lookup { table, addr } => match set.lookup(table, addr)? {
                Some(v) => {
                    let _ = writeln!(out, "{v}");
                }
                None => out.push_str("not found\n"),
            },
        }
        Ok(out)
    }
}

/// Process exit status for a failed command, one per error kind.
pub fn exit_code(e: &Error) -> i32 {
    match e {
        Error::Syntax(_) => 64,
        Error::InvalidTableId(_) | Error::InvalidMask(_) => 65,
        Error::OutOfMemory => 71,
        Error::Duplicate { .. } => 73,
        Error::NotFound { .. } => 74,
        Error::NotInitialized => 70,
    }
}
