// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — decode with orientation normalisation, crop, encode.

pub mod orientation;
pub mod processor;

pub use orientation::{apply_orientation, read_orientation};
pub use processor::ImageProcessor;
