use std::collections::BTreeMap;

use crate::core::catalog::{Action, ArgKind, ArgSpec, Catalog};
use crate::core::config::Config;
use crate::core::error::{DorisError, Resolution, ResolvedCommand, Result};
use crate::core::index::KeywordIndex;
use crate::core::matcher::{split_keywords, KeywordMatcher};
use crate::core::pools::TokenPools;
use crate::core::prompt::{choose, Choice, Prompter};
use crate::core::store::ModelStore;
use crate::core::tokenizer::tokenize;
use crate::output::Printer;

/// Orchestrates one query from raw text to `(action, arguments)`.
///
/// Action selection runs cheapest-first: keyword frequency against the
/// index, then the trained classifier, then the user. Every user correction
/// becomes a partial-fit so the same phrasing resolves automatically next
/// time. All collaborators are injected; the engine owns no state beyond a
/// cached vocabulary.
pub struct ResolutionEngine<'a> {
    catalog: &'a Catalog,
    index: &'a KeywordIndex,
    matcher: &'a dyn KeywordMatcher,
    store: &'a ModelStore,
    config: &'a Config,
    printer: Printer,
    vocabulary: Vec<String>,
}

enum Extract {
    Value(String),
    Skip,
    Missing,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(
        catalog: &'a Catalog,
        index: &'a KeywordIndex,
        matcher: &'a dyn KeywordMatcher,
        store: &'a ModelStore,
        config: &'a Config,
        printer: Printer,
    ) -> Result<ResolutionEngine<'a>> {
        config.validate()?;
        Ok(ResolutionEngine {
            catalog,
            index,
            matcher,
            store,
            config,
            printer,
            vocabulary: index.vocabulary(),
        })
    }

    /// One full resolution pass. Pools and tokens live only inside this
    /// call; the only durable side effects are classifier updates.
    pub fn resolve(&self, query: &str, prompter: &mut dyn Prompter) -> Result<Resolution> {
        let tokens = tokenize(query)?;
        let matched = split_keywords(
            self.matcher,
            &tokens,
            &self.vocabulary,
            self.config.probability_cutoff,
        )?;
        if matched.keywords.is_empty() {
            return Err(DorisError::syntax("no keywords found in query"));
        }

        let action_id = match self.resolve_action(&matched.keywords, prompter)? {
            Some(id) => id,
            None => return Ok(Resolution::Skipped),
        };
        let action = self.catalog.get(&action_id).ok_or_else(|| {
            DorisError::resolution(format!("selected action '{}' is not in the catalog", action_id))
        })?;

        // Unquoted argument descriptors ("the app", "with file") name a slot
        // rather than fill one; they are dropped before pooling.
        let value_tokens: Vec<_> = matched
            .non_keywords
            .into_iter()
            .filter(|token| {
                token.quoted
                    || self
                        .index
                        .arg_indices_for(&action_id, &token.text.to_lowercase())
                        .is_none()
            })
            .collect();

        let mut pools = TokenPools::classify(&value_tokens);
        match self.resolve_arguments(&action_id, action, &mut pools, prompter)? {
            Some(args) => Ok(Resolution::Resolved(ResolvedCommand {
                action: action_id,
                args,
            })),
            None => Ok(Resolution::Skipped),
        }
    }

    fn resolve_action(
        &self,
        keywords: &[String],
        prompter: &mut dyn Prompter,
    ) -> Result<Option<String>> {
        if let Some(id) = self.action_by_frequency(keywords) {
            return Ok(Some(id));
        }

        let candidates = self
            .store
            .with_bundle(|b| b.action_model.predict_top_k(keywords, self.config.top_k));
        if candidates.is_empty() {
            return Err(DorisError::resolution("action classifier has no classes"));
        }
        if let Some((label, probability)) = candidates.first() {
            if *probability >= self.config.auto_select_probability {
                return Ok(Some(label.clone()));
            }
        }

        let labeled: Vec<(String, String)> = candidates
            .iter()
            .map(|(id, _)| {
                let description = self
                    .catalog
                    .get(id)
                    .map(|a| a.description.clone())
                    .unwrap_or_else(|| id.clone());
                (id.clone(), description)
            })
            .collect();
        match choose(
            prompter,
            "Which command did you mean?",
            &labeled,
            |(_, description)| description.clone(),
        )? {
            Choice::Skip => Ok(None),
            Choice::Picked(position) => {
                let id = labeled[position].0.clone();
                self.train_action(keywords, &id);
                Ok(Some(id))
            }
        }
    }

    /// Fast path: per-action membership counts over the keyword index,
    /// normalized by total keyword occurrences. Skips classifier inference
    /// entirely when one action clears the cutoff.
    fn action_by_frequency(&self, keywords: &[String]) -> Option<String> {
        let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
        for keyword in keywords {
            *occurrences.entry(keyword.as_str()).or_insert(0) += 1;
        }

        let mut scores: BTreeMap<&String, usize> = BTreeMap::new();
        for (keyword, count) in &occurrences {
            if let Some(actions) = self.index.actions_for(keyword) {
                for action in actions {
                    *scores.entry(action).or_insert(0) += *count;
                }
            }
        }

        let mut best: Option<(&String, usize)> = None;
        for (action, score) in &scores {
            match best {
                Some((_, top)) if *score <= top => {}
                _ => best = Some((action, *score)),
            }
        }

        let total = keywords.len() as f64;
        match best {
            Some((action, score)) if score as f64 / total >= self.config.probability_cutoff => {
                Some(action.clone())
            }
            _ => None,
        }
    }

    fn resolve_arguments(
        &self,
        action_id: &str,
        action: &Action,
        pools: &mut TokenPools,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<Vec<Option<String>>>> {
        let required = action.required_args();
        let optional = action.optional_args();
        check_availability(&required, pools)?;

        // Concrete kinds claim their pool entries first; `any` slots are
        // deferred to a second pass so they draw from what remains.
        let mut required_values: Vec<(usize, String)> = Vec::new();
        for any_pass in [false, true] {
            for arg in required
                .iter()
                .copied()
                .filter(|a| (a.kind == ArgKind::Any) == any_pass)
            {
                match self.extract(action_id, arg, pools, prompter)? {
                    Extract::Value(value) => required_values.push((arg.index, value)),
                    Extract::Skip => return Ok(None),
                    Extract::Missing => {
                        return Err(DorisError::resolution(format!(
                            "no {} value left for required argument '{}' of action '{}'",
                            arg.kind, arg.description, action_id
                        )))
                    }
                }
            }
        }
        required_values.sort_by_key(|(index, _)| *index);

        let mut optional_values: Vec<(usize, String)> = Vec::new();
        for &arg in &optional {
            match self.extract(action_id, arg, pools, prompter)? {
                Extract::Value(value) => optional_values.push((arg.index, value)),
                Extract::Skip => return Ok(None),
                // The first optional argument with nothing left stops all
                // further optional assignment.
                Extract::Missing => break,
            }
        }

        let mut slots: Vec<Option<String>> = vec![None; action.args.len()];
        for (index, value) in merge_by_index(required_values, optional_values) {
            let slot = slots.get_mut(index).ok_or_else(|| {
                DorisError::resolution(format!(
                    "argument index {} out of range for action '{}' ({} declared)",
                    index,
                    action_id,
                    action.args.len()
                ))
            })?;
            if slot.is_some() {
                return Err(DorisError::resolution(format!(
                    "argument slot {} of action '{}' filled twice",
                    index, action_id
                )));
            }
            *slot = Some(value);
        }
        for arg in &required {
            if slots[arg.index].is_none() {
                return Err(DorisError::resolution(format!(
                    "required argument '{}' of action '{}' left unset",
                    arg.description, action_id
                )));
            }
        }
        Ok(Some(slots))
    }

    fn extract(
        &self,
        action_id: &str,
        arg: &ArgSpec,
        pools: &mut TokenPools,
        prompter: &mut dyn Prompter,
    ) -> Result<Extract> {
        let candidates = pools.candidates(arg.kind);
        match candidates.len() {
            0 => Ok(Extract::Missing),
            1 => {
                let value = pools
                    .take(arg.kind, 0)
                    .ok_or_else(|| DorisError::resolution("candidate vanished from pool"))?;
                Ok(Extract::Value(value))
            }
            _ => {
                if let Some(position) = self.argument_model_pick(action_id, arg, &candidates) {
                    let value = pools.take(arg.kind, position).ok_or_else(|| {
                        DorisError::resolution("predicted candidate vanished from pool")
                    })?;
                    return Ok(Extract::Value(value));
                }
                let message = format!("Which value for {}?", arg.description);
                match choose(prompter, &message, &candidates, |c| c.clone())? {
                    Choice::Skip => Ok(Extract::Skip),
                    Choice::Picked(position) => {
                        let value = pools.take(arg.kind, position).ok_or_else(|| {
                            DorisError::resolution("picked candidate vanished from pool")
                        })?;
                        self.train_argument(action_id, &value, arg.index);
                        Ok(Extract::Value(value))
                    }
                }
            }
        }
    }

    /// Lets a trained argument model settle a multi-candidate slot without
    /// prompting. Only consulted when the model actually distinguishes two
    /// or more slots; a single-class model would bless any value.
    fn argument_model_pick(
        &self,
        action_id: &str,
        arg: &ArgSpec,
        candidates: &[String],
    ) -> Option<usize> {
        let label = arg.index.to_string();
        self.store.with_bundle(|b| {
            let model = b.arg_models.get(action_id)?;
            if model.classes().count() < 2 {
                return None;
            }
            let mut best: Option<(usize, f64)> = None;
            for (position, value) in candidates.iter().enumerate() {
                let probability = model
                    .predict_top_k(&[value.as_str()], usize::MAX)
                    .into_iter()
                    .find(|(l, _)| *l == label)
                    .map(|(_, p)| p)?;
                match best {
                    Some((_, top)) if probability <= top => {}
                    _ => best = Some((position, probability)),
                }
            }
            match best {
                Some((position, probability))
                    if probability >= self.config.auto_select_probability =>
                {
                    Some(position)
                }
                _ => None,
            }
        })
    }

    fn train_action(&self, keywords: &[String], action: &str) {
        self.store
            .with_bundle_mut(|b| b.action_model.partial_fit(keywords, action));
        if let Err(e) = self.store.save() {
            self.printer.warning(&format!(
                "learned '{}' for this phrasing, but saving failed: {}",
                action, e
            ));
        }
    }

    fn train_argument(&self, action: &str, value: &str, index: usize) {
        self.store.with_bundle_mut(|b| {
            b.arg_models
                .entry(action.to_string())
                .or_default()
                .partial_fit(&[value], &index.to_string())
        });
        if let Err(e) = self.store.save() {
            self.printer
                .warning(&format!("argument choice could not be saved: {}", e));
        }
    }
}

/// Verifies the pools can cover every required argument before extraction
/// starts. `any` requirements may be fed by surplus values of concrete
/// kinds once those kinds' own requirements are satisfied.
pub(crate) fn check_availability(required: &[&ArgSpec], pools: &TokenPools) -> Result<()> {
    let mut needed: BTreeMap<ArgKind, usize> = BTreeMap::new();
    for arg in required {
        *needed.entry(arg.kind).or_insert(0) += 1;
    }

    let mut shortfalls = Vec::new();
    let mut surplus = 0usize;
    for kind in [ArgKind::Int, ArgKind::Str] {
        let need = needed.get(&kind).copied().unwrap_or(0);
        let have = pools.available(kind);
        if have < need {
            shortfalls.push(format!("{}: required {}, found {}", kind, need, have));
        } else {
            surplus += have - need;
        }
    }
    let any_need = needed.get(&ArgKind::Any).copied().unwrap_or(0);
    let any_have = pools.available(ArgKind::Any) + surplus;
    if any_have < any_need {
        shortfalls.push(format!("any: required {}, found {}", any_need, any_have));
    }

    if !shortfalls.is_empty() {
        return Err(DorisError::syntax(format!(
            "insufficient arguments ({})",
            shortfalls.join("; ")
        )));
    }
    Ok(())
}

/// Order-preserving merge of two index-sorted `(index, value)` lists.
pub(crate) fn merge_by_index(
    required: Vec<(usize, String)>,
    optional: Vec<(usize, String)>,
) -> Vec<(usize, String)> {
    let mut merged = Vec::with_capacity(required.len() + optional.len());
    let mut rest = optional.into_iter().peekable();
    for item in required {
        while rest.peek().is_some_and(|r| r.0 < item.0) {
            if let Some(r) = rest.next() {
                merged.push(r);
            }
        }
        merged.push(item);
    }
    merged.extend(rest);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matcher::LevenshteinMatcher;
    use crate::core::prompt::ScriptedPrompter;
    use crate::core::tokenizer::Token;

    struct Fixture {
        catalog: Catalog,
        index: KeywordIndex,
        store: ModelStore,
        config: Config,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(catalog_json: &str) -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let catalog = Catalog::from_json(catalog_json).unwrap();
            let index = KeywordIndex::build(&catalog);
            let (store, _) = ModelStore::open(dir.path().join("brain.json"), &catalog, &index);
            Fixture {
                catalog,
                index,
                store,
                config: Config::default(),
                _dir: dir,
            }
        }

        fn engine(&self) -> ResolutionEngine<'_> {
            ResolutionEngine::new(
                &self.catalog,
                &self.index,
                &LevenshteinMatcher,
                &self.store,
                &self.config,
                Printer::plain(),
            )
            .unwrap()
        }
    }

    const LAUNCHER: &str = r#"{
        "start": {
            "keywords": ["launch", "open", "run"],
            "args": [
                {
                    "index": 0,
                    "kind": "any",
                    "description": "program to start",
                    "required": true,
                    "keywords": ["program", "app"]
                }
            ],
            "description": "Start a program"
        }
    }"#;

    const AMBIGUOUS: &str = r#"{
        "alpha": {
            "keywords": ["go"],
            "description": "Action alpha"
        },
        "bravo": {
            "keywords": ["halt"],
            "description": "Action bravo"
        }
    }"#;

    fn spec(index: usize, kind: ArgKind, required: bool) -> ArgSpec {
        ArgSpec {
            index,
            kind,
            format: String::new(),
            description: format!("arg {}", index),
            required,
            keywords: Vec::new(),
        }
    }

    #[test]
    fn frequency_fast_path_skips_the_classifier() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        let keywords = vec!["launch".to_string(), "launch".to_string()];
        assert_eq!(engine.action_by_frequency(&keywords), Some("start".to_string()));
    }

    #[test]
    fn resolves_simple_query_without_prompting() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        let mut prompter = ScriptedPrompter::new([]);
        let resolution = engine.resolve("launch spotify", &mut prompter).unwrap();
        assert_eq!(
            resolution,
            Resolution::Resolved(ResolvedCommand {
                action: "start".to_string(),
                args: vec![Some("spotify".to_string())],
            })
        );
    }

    #[test]
    fn quoted_value_wins_over_unquoted() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        let mut prompter = ScriptedPrompter::new([]);
        let resolution = engine
            .resolve(r#"launch "my app" editor"#, &mut prompter)
            .unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(command.args, vec![Some("my app".to_string())]);
    }

    #[test]
    fn no_keywords_is_a_syntax_error() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        let mut prompter = ScriptedPrompter::new([]);
        let result = engine.resolve("zzz qqq", &mut prompter);
        assert!(matches!(result, Err(DorisError::Syntax(_))));
    }

    #[test]
    fn missing_required_value_is_a_syntax_error() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        let mut prompter = ScriptedPrompter::new([]);
        let result = engine.resolve("launch", &mut prompter);
        assert!(matches!(result, Err(DorisError::Syntax(_))));
    }

    #[test]
    fn ambiguous_action_prompt_skip_aborts() {
        let fixture = Fixture::new(AMBIGUOUS);
        let engine = fixture.engine();
        // Two candidates, so 3 is the explicit skip index.
        let mut prompter = ScriptedPrompter::new(["3"]);
        let resolution = engine.resolve("go halt", &mut prompter).unwrap();
        assert_eq!(resolution, Resolution::Skipped);
    }

    #[test]
    fn disambiguation_trains_the_action_classifier() {
        let fixture = Fixture::new(AMBIGUOUS);
        let engine = fixture.engine();

        // Candidates are probability-tied, so they surface in label order:
        // alpha, bravo. Pick bravo.
        let mut prompter = ScriptedPrompter::new(["2"]);
        let resolution = engine.resolve("go halt", &mut prompter).unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(command.action, "bravo");

        // The same phrasing now clears the auto-select threshold: no answer
        // scripted, and resolution still succeeds.
        let mut silent = ScriptedPrompter::new([]);
        let resolution = engine.resolve("go halt", &mut silent).unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(command.action, "bravo");
    }

    #[test]
    fn value_disambiguation_trains_the_argument_classifier() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        // Two str candidates for one slot; pick the second.
        let mut prompter = ScriptedPrompter::new(["2"]);
        let resolution = engine.resolve("launch vim emacs", &mut prompter).unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(command.args, vec![Some("emacs".to_string())]);
        fixture.store.with_bundle(|b| {
            let model = b.arg_models.get("start").unwrap();
            let (label, _) = model.predict_top_k(&["emacs"], 1).remove(0);
            assert_eq!(label, "0");
        });
    }

    #[test]
    fn descriptor_words_do_not_become_values() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        // "app" names the slot, so only "vim" is left as a candidate and no
        // prompt is needed.
        let mut prompter = ScriptedPrompter::new([]);
        let resolution = engine.resolve("launch app vim", &mut prompter).unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(command.args, vec![Some("vim".to_string())]);
    }

    #[test]
    fn trained_argument_model_settles_candidates_silently() {
        const COPY: &str = r#"{
            "copy": {
                "keywords": ["copy"],
                "args": [
                    {"index": 0, "kind": "str", "description": "source", "required": true,
                     "keywords": ["source", "from"]},
                    {"index": 1, "kind": "str", "description": "target", "required": true,
                     "keywords": ["target", "to"]}
                ],
                "description": "Copy a thing"
            }
        }"#;
        let fixture = Fixture::new(COPY);
        let engine = fixture.engine();
        fixture.store.with_bundle_mut(|b| {
            let model = b.arg_models.get_mut("copy").unwrap();
            for _ in 0..3 {
                model.partial_fit(&["alpha"], "0");
            }
        });

        // Nothing scripted: a prompt would read as a skip, so a resolved
        // command proves both slots were settled by the model.
        let mut prompter = ScriptedPrompter::new([]);
        let resolution = engine.resolve("copy alpha beta", &mut prompter).unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(
            command.args,
            vec![Some("alpha".to_string()), Some("beta".to_string())]
        );
    }

    #[test]
    fn value_disambiguation_skip_aborts() {
        let fixture = Fixture::new(LAUNCHER);
        let engine = fixture.engine();
        let mut prompter = ScriptedPrompter::new(["nope"]);
        let resolution = engine.resolve("launch vim emacs", &mut prompter).unwrap();
        assert_eq!(resolution, Resolution::Skipped);
    }

    #[test]
    fn optional_extraction_stops_at_first_miss() {
        const THREE_ARGS: &str = r#"{
            "tool": {
                "keywords": ["tool"],
                "args": [
                    {"index": 0, "kind": "int", "description": "count", "required": true},
                    {"index": 1, "kind": "int", "description": "depth", "required": false},
                    {"index": 2, "kind": "str", "description": "name", "required": false}
                ],
                "description": "A tool"
            }
        }"#;
        let fixture = Fixture::new(THREE_ARGS);
        let engine = fixture.engine();
        let mut prompter = ScriptedPrompter::new([]);
        // "word" could fill slot 2, but the miss on slot 1 stops optional
        // assignment first.
        let resolution = engine.resolve("tool 5 word", &mut prompter).unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(command.args, vec![Some("5".to_string()), None, None]);
    }

    #[test]
    fn any_slot_defers_to_concrete_requirements() {
        const MIXED: &str = r#"{
            "tool": {
                "keywords": ["tool"],
                "args": [
                    {"index": 0, "kind": "any", "description": "value", "required": true},
                    {"index": 1, "kind": "str", "description": "name", "required": true}
                ],
                "description": "A tool"
            }
        }"#;
        let fixture = Fixture::new(MIXED);
        let engine = fixture.engine();
        // The str slot claims "word" first even though the any slot comes
        // earlier by index; the any slot then gets what remains. Extracting
        // in index order instead would see two candidates and prompt.
        let mut prompter = ScriptedPrompter::new([]);
        let resolution = engine.resolve("tool word 7", &mut prompter).unwrap();
        let Resolution::Resolved(command) = resolution else {
            panic!("expected a resolved command");
        };
        assert_eq!(
            command.args,
            vec![Some("7".to_string()), Some("word".to_string())]
        );
    }

    #[test]
    fn availability_check_counts_by_kind() {
        let one_str = TokenPools::classify(&[Token::bare("alpha")]);
        let specs = [spec(0, ArgKind::Str, true), spec(1, ArgKind::Str, true)];
        let required: Vec<&ArgSpec> = specs.iter().collect();
        assert!(matches!(
            check_availability(&required, &one_str),
            Err(DorisError::Syntax(_))
        ));
    }

    #[test]
    fn any_requirement_accepts_surplus_of_concrete_kinds() {
        let one_int = TokenPools::classify(&[Token::bare("1")]);
        let specs = [spec(0, ArgKind::Any, true)];
        let required: Vec<&ArgSpec> = specs.iter().collect();
        assert!(check_availability(&required, &one_int).is_ok());
    }

    #[test]
    fn merge_preserves_index_order() {
        let required = vec![(0, "A".to_string()), (2, "C".to_string())];
        let optional = vec![(1, "B".to_string())];
        let merged = merge_by_index(required, optional);
        assert_eq!(
            merged,
            vec![
                (0, "A".to_string()),
                (1, "B".to_string()),
                (2, "C".to_string()),
            ]
        );
    }

    #[test]
    fn merge_handles_empty_sides() {
        assert!(merge_by_index(Vec::new(), Vec::new()).is_empty());
        let only_required = merge_by_index(vec![(0, "A".to_string())], Vec::new());
        assert_eq!(only_required, vec![(0, "A".to_string())]);
    }
}
