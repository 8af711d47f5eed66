//! Ordered fallback from typed parametrization down to a raw copy.

use super::{parametrize, parametrize_with_datatypes, Selection, TypeInferrer};
use crate::error::{FragmentError, Result};
use crate::status::Status;
use serde::Serialize;

/// Resolved editor selection: originating file, its text and the range.
#[derive(Debug, Clone)]
pub struct SelectionInput {
    pub file_name: String,
    pub source: String,
    pub selection: Selection,
}

impl SelectionInput {
    pub fn new(file_name: impl Into<String>, source: impl Into<String>, selection: Selection) -> Self {
        Self {
            file_name: file_name.into(),
            source: source.into(),
            selection,
        }
    }

    pub fn whole_file(file_name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let selection = Selection::all(&source);
        Self::new(file_name, source, selection)
    }

    pub fn is_python(&self) -> bool {
        self.file_name.ends_with(".py")
    }

    pub fn raw_text(&self) -> &str {
        self.selection.text(&self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    WithDatatypes,
    WithoutDatatypes,
    Raw,
}

impl Tier {
    pub fn success_message(self) -> &'static str {
        match self {
            Tier::WithDatatypes => "Successfully Added Parametrized Fragment with Datatypes",
            Tier::WithoutDatatypes => "Successfully Added Parametrized Fragment",
            Tier::Raw => "Added Fragment without Parametrization",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Tier::WithDatatypes => "Parametrization with Datatypes Failed",
            Tier::WithoutDatatypes => "Parametrization Failed. Python Code not executable?",
            Tier::Raw => "Fragment body could not be copied",
        }
    }

    pub fn is_parametrized(self) -> bool {
        self != Tier::Raw
    }
}

/// Body and placeholder metadata for a new fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draft {
    pub body: String,
    pub placeholders: String,
}

pub trait BodyStrategy {
    fn tier(&self) -> Tier;
    fn build(&self, input: &SelectionInput) -> Result<Draft>;
}

struct WithDatatypes<'a> {
    inferrer: &'a dyn TypeInferrer,
}

impl BodyStrategy for WithDatatypes<'_> {
    fn tier(&self) -> Tier {
        Tier::WithDatatypes
    }

    fn build(&self, input: &SelectionInput) -> Result<Draft> {
        let typed = parametrize_with_datatypes(&input.source, &input.selection, self.inferrer)?;
        Ok(Draft {
            placeholders: typed.placeholder_list(),
            body: typed.body,
        })
    }
}

struct WithoutDatatypes;

impl BodyStrategy for WithoutDatatypes {
    fn tier(&self) -> Tier {
        Tier::WithoutDatatypes
    }

    fn build(&self, input: &SelectionInput) -> Result<Draft> {
        let plain = parametrize(&input.source, &input.selection)?;
        Ok(Draft {
            placeholders: plain.placeholder_list(),
            body: plain.body,
        })
    }
}

struct Raw;

impl BodyStrategy for Raw {
    fn tier(&self) -> Tier {
        Tier::Raw
    }

    fn build(&self, input: &SelectionInput) -> Result<Draft> {
        Ok(Draft {
            body: input.raw_text().to_string(),
            placeholders: String::new(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub draft: Draft,
    pub tier: Tier,
    pub statuses: Vec<Status>,
}

/// Strategies tried in order; the first success wins.
pub struct Cascade<'a> {
    strategies: Vec<Box<dyn BodyStrategy + 'a>>,
}

impl<'a> Cascade<'a> {
    pub fn new(strategies: Vec<Box<dyn BodyStrategy + 'a>>) -> Self {
        Self { strategies }
    }

    /// Datatypes (when an inferrer is given), then plain, then raw. Non-Python
    /// files only get the raw copy.
    pub fn for_input(input: &SelectionInput, inferrer: Option<&'a dyn TypeInferrer>) -> Self {
        let mut strategies: Vec<Box<dyn BodyStrategy + 'a>> = Vec::new();
        if input.is_python() {
            if let Some(inferrer) = inferrer {
                strategies.push(Box::new(WithDatatypes { inferrer }));
            }
            strategies.push(Box::new(WithoutDatatypes));
        }
        strategies.push(Box::new(Raw));
        Self::new(strategies)
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.strategies.iter().map(|s| s.tier()).collect()
    }

    pub fn run(&self, input: &SelectionInput) -> Result<CascadeOutcome> {
        let mut statuses = Vec::new();
        if !input.is_python() {
            statuses.push(Status::info("Parametrization only Supported for Python"));
        }

        let mut skip_parametrized = false;
        let mut last_err = None;
        for strategy in &self.strategies {
            let tier = strategy.tier();
            if skip_parametrized && tier.is_parametrized() {
                continue;
            }
            match strategy.build(input) {
                Ok(draft) => {
                    tracing::debug!(?tier, file = %input.file_name, "Fragment body built");
                    statuses.push(Status::info(tier.success_message()));
                    return Ok(CascadeOutcome {
                        draft,
                        tier,
                        statuses,
                    });
                }
                Err(FragmentError::NoPlaceholders) => {
                    // No later parametrizing tier can find any either.
                    statuses.push(Status::info("No Placeholders found"));
                    skip_parametrized = true;
                    last_err = Some(FragmentError::NoPlaceholders);
                }
                Err(err) => {
                    tracing::warn!(?tier, error = %err, "Parametrization tier failed");
                    statuses.push(Status::error(tier.failure_message()));
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| FragmentError::Execution("no strategy configured".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parametrize::{Position, StaticInferrer};

    struct Failing;

    impl TypeInferrer for Failing {
        fn infer(&self, _context: &str, _names: &[String]) -> Result<Vec<String>> {
            Err(FragmentError::Execution("boom".to_string()))
        }
    }

    fn messages(statuses: &[Status]) -> Vec<&str> {
        statuses.iter().map(|s| s.message.as_str()).collect()
    }

    #[test]
    fn unknown_type_falls_back_to_plain_parametrization() {
        let input = SelectionInput::new(
            "calc.py",
            "n = 3\nprint(n * step)\n",
            Selection::new(Position::new(1, 0), Position::new(1, 15)),
        );
        let cascade = Cascade::for_input(&input, Some(&StaticInferrer));
        assert_eq!(
            cascade.tiers(),
            vec![Tier::WithDatatypes, Tier::WithoutDatatypes, Tier::Raw]
        );
        // `step` has no binding before the selection.
        let outcome = cascade.run(&input).unwrap();
        assert_eq!(outcome.tier, Tier::WithoutDatatypes);
        assert_eq!(outcome.draft.body, "print(${1:n} * ${2:step})");
        assert_eq!(outcome.draft.placeholders, "n,step");
        assert_eq!(
            messages(&outcome.statuses),
            vec![
                "Parametrization with Datatypes Failed",
                "Successfully Added Parametrized Fragment"
            ]
        );
    }

    #[test]
    fn datatype_tier_wins_when_types_are_known() {
        let input = SelectionInput::new(
            "calc.py",
            "n = 3\nprint(n)\n",
            Selection::new(Position::new(1, 0), Position::new(1, 8)),
        );
        let outcome = Cascade::for_input(&input, Some(&StaticInferrer)).run(&input).unwrap();
        assert_eq!(outcome.tier, Tier::WithDatatypes);
        assert_eq!(outcome.draft.placeholders, "n:int");
        assert_eq!(
            messages(&outcome.statuses),
            vec!["Successfully Added Parametrized Fragment with Datatypes"]
        );
    }

    #[test]
    fn broken_python_falls_back_to_raw() {
        let input = SelectionInput::whole_file("broken.py", "x = foo(");
        let outcome = Cascade::for_input(&input, Some(&Failing)).run(&input).unwrap();
        assert_eq!(outcome.tier, Tier::Raw);
        assert_eq!(outcome.draft.body, "x = foo(");
        assert!(outcome.statuses[0].is_error());
        assert_eq!(outcome.statuses.len(), 3);
    }

    #[test]
    fn no_placeholders_goes_straight_to_raw() {
        let input = SelectionInput::whole_file("const.py", "x = 1\n");
        let outcome = Cascade::for_input(&input, Some(&Failing)).run(&input).unwrap();
        assert_eq!(outcome.tier, Tier::Raw);
        assert_eq!(outcome.draft.body, "x = 1\n");
        assert_eq!(
            messages(&outcome.statuses),
            vec!["No Placeholders found", "Added Fragment without Parametrization"]
        );
    }

    #[test]
    fn non_python_files_are_copied() {
        let input = SelectionInput::whole_file("main.rs", "let x = y;");
        let cascade = Cascade::for_input(&input, Some(&StaticInferrer));
        assert_eq!(cascade.tiers(), vec![Tier::Raw]);
        let outcome = cascade.run(&input).unwrap();
        assert_eq!(outcome.draft.body, "let x = y;");
        assert_eq!(
            messages(&outcome.statuses),
            vec![
                "Parametrization only Supported for Python",
                "Added Fragment without Parametrization"
            ]
        );
    }

    #[test]
    fn empty_cascade_reports_an_error() {
        let input = SelectionInput::whole_file("a.py", "y");
        assert!(Cascade::new(Vec::new()).run(&input).is_err());
    }
}
