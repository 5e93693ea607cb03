// Dweve CBF - Conic Benchmark Format toolkit
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Domain tags of variable and map stacks.

use std::fmt;
use std::str::FromStr;

/// Cone a stack of scalar variables or map rows must lie in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Domain {
    /// `F`: no restriction.
    Free,
    /// `L+`: every coordinate is non-negative.
    NonNeg,
    /// `L-`: every coordinate is non-positive.
    NonPos,
    /// `L=`: every coordinate is zero.
    Zero,
    /// `Q`: first coordinate bounds the Euclidean norm of the rest.
    Quadratic,
    /// `QR`: `2 * x0 * x1 >= ||rest||^2` with `x0, x1 >= 0`.
    RotatedQuadratic,
    /// Any other tag, kept verbatim.
    Custom(String),
}

impl Domain {
    /// The tag as written in CBF files.
    pub fn tag(&self) -> &str {
        match self {
            Self::Free => "F",
            Self::NonNeg => "L+",
            Self::NonPos => "L-",
            Self::Zero => "L=",
            Self::Quadratic => "Q",
            Self::RotatedQuadratic => "QR",
            Self::Custom(tag) => tag,
        }
    }

    /// Parse a tag. Unknown tags become [`Domain::Custom`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "F" => Self::Free,
            "L+" => Self::NonNeg,
            "L-" => Self::NonPos,
            "L=" => Self::Zero,
            "Q" => Self::Quadratic,
            "QR" => Self::RotatedQuadratic,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Number of leading coordinates of a stack that carry a `>= 0` bound
    /// when used for simple-bound derivation. `usize::MAX` means all of them.
    pub fn nonneg_prefix(&self) -> usize {
        match self {
            Self::NonNeg | Self::Zero => usize::MAX,
            Self::Quadratic => 2,
            Self::RotatedQuadratic => 3,
            _ => 0,
        }
    }

    /// Whether coordinate `k` of a stack of this domain is bounded below by zero.
    #[inline]
    pub fn bounds_below(&self, k: usize) -> bool {
        k < self.nonneg_prefix()
    }

    /// Whether every coordinate of a stack of this domain is bounded above by zero.
    #[inline]
    pub fn bounds_above(&self) -> bool {
        matches!(self, Self::NonPos | Self::Zero)
    }

    /// `F`, `L+`, `L-` and `L=`.
    pub fn is_linear(&self) -> bool {
        matches!(self, Self::Free | Self::NonNeg | Self::NonPos | Self::Zero)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Domain {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}
