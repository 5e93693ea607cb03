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

//! Property-based tests for header integrity and query minimality.

use cbf_stream::{CbfErrorKind, KeyQuery, ParserConfig, SnapshotParser};
use proptest::prelude::*;
use std::io::Cursor;

fn domain_tag() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["F", "L+", "L-", "L=", "Q", "QR"])
}

fn stacks() -> impl Strategy<Value = Vec<(&'static str, usize)>> {
    prop::collection::vec((domain_tag(), 1usize..6), 1..6)
}

fn block(keyword: &str, total: usize, stacks: &[(&str, usize)]) -> String {
    let mut out = format!("{}\n{} {}\n", keyword, total, stacks.len());
    for (tag, dim) in stacks {
        out.push_str(&format!("{} {}\n", tag, dim));
    }
    out
}

fn document(var_total: usize, vars: &[(&str, usize)], cons: &[(&str, usize)]) -> String {
    let con_total: usize = cons.iter().map(|(_, d)| d).sum();
    format!(
        "VER\n3\nOBJSENSE\nMIN\n{}{}",
        block("VAR", var_total, vars),
        block("CON", con_total, cons)
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: stack dimensions sum to the declared total, or parsing fails.
    #[test]
    fn prop_stack_totals(vars in stacks(), cons in stacks(), delta in 0usize..3) {
        let sum: usize = vars.iter().map(|(_, d)| d).sum();
        let input = document(sum + delta, &vars, &cons);
        let result = SnapshotParser::new(Cursor::new(input), "p").collect_all();

        if delta == 0 {
            let models = result.unwrap();
            let m = &models[0];
            let dims: usize = m.variables().stacks.iter().map(|s| s.dim).sum();
            prop_assert_eq!(dims, m.varnum());
            let rows: usize = m.maps().stacks.iter().map(|s| s.dim).sum();
            prop_assert_eq!(rows, m.mapnum());
        } else {
            prop_assert_eq!(result.unwrap_err().kind, CbfErrorKind::InconsistentHeader);
        }
    }

    /// Property: a header-only VAR query leaves the cursor where a full one does.
    #[test]
    fn prop_head_query_positions_cursor(vars in stacks(), cons in stacks()) {
        let sum: usize = vars.iter().map(|(_, d)| d).sum();
        let input = document(sum, &vars, &cons);

        let parse = |keys: [&str; 2]| {
            let config = ParserConfig::with_query(KeyQuery::parse(keys).unwrap());
            SnapshotParser::with_config(Cursor::new(input.clone()), "p", config)
                .next()
                .unwrap()
                .unwrap()
        };
        let head = parse(["VAR:HEAD", "CON"]);
        let full = parse(["VAR", "CON"]);

        prop_assert!(head.variables().stacks.is_empty());
        prop_assert_eq!(head.varnum(), full.varnum());
        prop_assert_eq!(full.variables().stacks.len(), vars.len());
        prop_assert_eq!(head.maps(), full.maps());
    }
}
