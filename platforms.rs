// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

/// Names accepted for `--cfg platform="..."`.
pub const PLATFORMS: [&str; 1] = ["th500"];
