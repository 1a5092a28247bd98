use std::io::{self, BufRead, Write};

use anyhow::Context;

pub struct Prompt<R, W> {
    reader: R,
    writer: W,
}

impl Prompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Asks until an answer passes `validate`. An empty answer takes `default`; with no default
    /// the question is repeated.
    pub fn ask<F>(&mut self, query: &str, default: Option<&str>, validate: F) -> anyhow::Result<String>
    where
        F: Fn(&str) -> anyhow::Result<()>,
    {
        let default = default.filter(|d| !d.is_empty());
        loop {
            match default {
                Some(default) => write!(self.writer, "{} (Default: {}): ", query, default)?,
                None => write!(self.writer, "{}: ", query)?,
            }
            self.writer.flush()?;

            let mut text = String::new();
            let read = self.reader.read_line(&mut text)?;
            if read == 0 {
                anyhow::bail!("input closed while asking for {}", query);
            }

            let answer = match (text.trim(), default) {
                ("", Some(default)) => default,
                ("", None) => continue,
                (answer, _) => answer,
            };

            match validate(answer) {
                Ok(()) => return Ok(answer.to_string()),
                Err(err) => writeln!(self.writer, "{}", err)?,
            }
        }
    }

    pub fn ask_string(&mut self, query: &str, default: Option<&str>) -> anyhow::Result<String> {
        self.ask(query, default, |_| Ok(()))
    }

    pub fn ask_int<F>(&mut self, query: &str, default: Option<&str>, validate: F) -> anyhow::Result<u8>
    where
        F: Fn(&str) -> anyhow::Result<()>,
    {
        let answer = self.ask(query, default, validate)?;
        answer
            .parse()
            .with_context(|| format!("not a number: {}", answer))
    }
}
