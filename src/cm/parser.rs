// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Running the parsers which fill the repository.

use super::repository::CmRepository;
use crate::{
    acpi::{AcpiOemInfo, table_list::AmlTables},
    board::ResourceInfo,
    error::{Error, Result},
    numa::NumaInfo,
};
use log::{error, info, warn};

/// Everything a parser can read, and the repository it adds objects to.
pub struct ParserContext<'a> {
    /// The repository to fill.
    pub repository: &'a mut CmRepository,
    /// Boot-time facts about the board.
    pub resources: &'a ResourceInfo,
    /// The NUMA domains of the board.
    pub numa: &'a NumaInfo,
    /// Identity to put in generated table headers.
    pub oem: &'a AcpiOemInfo,
    /// The prebuilt AML tables for the chip.
    pub aml_tables: &'a AmlTables<'a>,
    /// Names of parsers which the board configuration disables.
    pub skipped: &'a [&'a str],
}

/// A function which adds the objects for one part of the system to the repository.
#[derive(Clone, Copy, Debug)]
pub struct HwInfoParser {
    /// Name of the parser, for logs.
    pub name: &'static str,
    /// The configuration name which disables the parser, if it can be disabled.
    pub skip_name: Option<&'static str>,
    /// The parser itself.
    pub parse: fn(&mut ParserContext) -> Result<()>,
}

impl HwInfoParser {
    fn is_skipped(&self, skipped: &[&str]) -> bool {
        self.skip_name
            .is_some_and(|skip_name| skipped.contains(&skip_name))
    }
}

/// Runs all the given parsers in order.
///
/// A parser which finds nothing to describe is ignored with a warning. Any other error stops the
/// run and is returned.
pub fn parse(context: &mut ParserContext, parsers: &[HwInfoParser]) -> Result<()> {
    for (index, parser) in parsers.iter().enumerate() {
        if parser.is_skipped(context.skipped) {
            info!("Skipping \"{}\" parser", parser.name);
            continue;
        }
        match (parser.parse)(context) {
            Ok(()) => {}
            Err(Error::NotFound) => {
                warn!(
                    "\"{}\" parser at index {index} returned {} - ignoring it",
                    parser.name,
                    Error::NotFound
                );
            }
            Err(e) => {
                error!("\"{}\" parser at index {index} returned {e}", parser.name);
                return Err(e);
            }
        }
    }
    Ok(())
}
