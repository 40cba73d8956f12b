extern crate symodel;

use rand::{Rng,SeedableRng};
use rand::rngs::StdRng;
use symodel::*;

fn sets() -> SetRegistry {
    let mut r = SetRegistry::new();
    r.insert(Dimension::new("A", &["a1","a2","a3"])).unwrap();
    r.insert(Dimension::new("B", &["b1","b2"])).unwrap();
    r.insert(Dimension::new("S", &["s1","s2"]).splitting()).unwrap();
    r
}

fn tables() -> Vec<TableDecl> {
    vec![
        TableDecl::new("X", TableKind::Endogenous, &["A","S"]).with_variable(VariableDecl::new("x", Some("A"), None)),
        TableDecl::new("D", TableKind::Exogenous, &["A","S"]).with_variable(VariableDecl::new("d", Some("A"), None)),
        TableDecl::new("ONE", TableKind::Constant, &["A"]).with_variable(VariableDecl::new("one", Some("A"), None).with_value(ConstantKind::SumVector)),
    ]
}

fn model(objective : &[&str], constraints : &[&str]) -> Model {
    let mut sm = SymbolicModel::new();
    for o in objective { sm = sm.with_objective(o); }
    for c in constraints { sm = sm.with_constraint(c); }
    Model::from_parts(sets(), tables(), [("m".to_string(),sm)].into_iter().collect()).unwrap()
}

/// Storage with random demand data.
fn store(m : &Model, seed : u64) -> MemoryStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut st = MemoryStore::new();
    m.initialize_storage(& mut st).unwrap();
    let rows : Vec<Row> = ["a1","a2","a3"].iter()
        .flat_map(|a| ["s1","s2"].iter().map(move |s| [*a,*s]))
        .map(|c| Row::new(&c, Some(rng.gen_range(1.0..10.0))))
        .collect();
    st.put_rows("D", rows, WriteMode::Insert).unwrap();
    st
}

fn by_name(mut ps : Vec<LinearProblem>) -> Vec<LinearProblem> {
    ps.sort_by(|a,b| a.name.cmp(&b.name));
    ps
}

#[test]
fn dummy_backend_problem() {
    let mut m = model(&["Minimize(tran(d) @ x)"], &["x >= 1", "tran(one) @ x <= 10"]);
    let mut st = store(&m, 1);
    let backend = dummy::Backend::new();
    let report = m.solve(&backend, & mut st, &Settings{ parallel : false, ..Default::default() }, OverwritePolicy::Overwrite).unwrap();
    assert!(report.all_optimal());
    assert_eq!(report.statuses.len(), 2);

    let ps = backend.problems();
    assert_eq!(ps.len(), 2);
    for p in ps.iter() {
        assert_eq!(p.num_columns(), 3);
        assert_eq!(p.num_rows(), 4);
        assert_eq!(&p.lb[..3], &[1.0,1.0,1.0]);
        assert_eq!(p.ub[3], 10.0);
        assert!(p.c.iter().all(|&c| (1.0..10.0).contains(&c)));
    }
    // each sub-problem owns its own columns
    assert!(ps[0].columns.iter().all(|c| ! ps[1].columns.contains(c)));

    let rows = st.get_rows("X", &Filter::new()).unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r.value == Some(0.0)));
}

#[test]
fn parallel_matches_sequential() {
    let run = |parallel : bool| {
        let mut m = model(&["Minimize(tran(d) @ x)"], &["x >= d", "sum(x) <= 100"]);
        let mut st = store(&m, 7);
        let backend = dummy::Backend::new();
        let report = m.solve(&backend, & mut st, &Settings{ parallel, ..Default::default() }, OverwritePolicy::Overwrite).unwrap();
        (report.statuses, by_name(backend.problems()))
    };
    assert_eq!(run(true), run(false));
}

#[test]
fn missing_exogenous_data() {
    let mut m = model(&["Minimize(tran(d) @ x)"], &["x >= 0"]);
    let mut st = MemoryStore::new();
    m.initialize_storage(& mut st).unwrap();
    st.put_rows("D", vec![Row::new(&["a1","s1"], Some(1.0))], WriteMode::Insert).unwrap();
    let e = m.solve(&dummy::Backend::new(), & mut st, &Settings::default(), OverwritePolicy::Overwrite).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::MissingData);
}

#[test]
fn unknown_identifier() {
    let mut m = model(&[], &["y >= 0"]);
    let e = m.build(OverwritePolicy::Overwrite).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Expression);
    assert!(m.problems().is_empty());
}

#[test]
fn binding_selection() {
    let sets = sets();
    let cat = VariableCatalog::build(&tables(), &sets).unwrap();
    let compiler = ExpressionCompiler::new(&cat);

    // without a splitting item both blocks of x match
    let e = compiler.compile("x >= 0", &SubProblemKey::default_key()).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Expression);

    // no binding for an unknown item: nothing to compile
    let key = SubProblemKey::new(vec![("S".to_string(),"s3".to_string())]);
    assert!(compiler.compile("x >= 0", &key).unwrap().is_empty());

    let key = SubProblemKey::new(vec![("S".to_string(),"s2".to_string())]);
    let res = compiler.compile("x >= d", &key).unwrap();
    assert_eq!(res.len(), 1);
    assert_eq!(compiler.compile("x >= d", &key).unwrap(), res);
}

#[test]
fn expression_errors() {
    let sets = sets();
    let cat = VariableCatalog::build(&tables(), &sets).unwrap();
    let compiler = ExpressionCompiler::new(&cat);
    let key = SubProblemKey::new(vec![("S".to_string(),"s1".to_string())]);

    for text in ["x * x >= 0", "x @ x >= 0", "Minimize(x)", "x >= (", "x + ONE_ >= 0"] {
        assert_eq!(compiler.compile(text, &key).unwrap_err().kind(), ErrorKind::Expression, "{}", text);
    }
}

#[test]
fn mixed_objective_sense() {
    let mut m = model(&["Minimize(sum(x))", "Maximize(sum(x))"], &[]);
    assert_eq!(m.build(OverwritePolicy::Overwrite).unwrap_err().kind(), ErrorKind::Expression);
}

#[test]
fn keep_existing_problems() {
    let mut m = model(&["Minimize(sum(x))"], &["x >= 0"]);
    assert_eq!(m.build(OverwritePolicy::Keep).unwrap(), BuildOutcome::Built);
    assert_eq!(m.build(OverwritePolicy::Keep).unwrap(), BuildOutcome::Kept);
    assert_eq!(m.build(OverwritePolicy::Overwrite).unwrap(), BuildOutcome::Built);
}

#[test]
fn resolve_needs_request() {
    let mut m = model(&["Minimize(sum(x))"], &["x >= 0"]);
    let mut st = store(&m, 3);
    let backend = dummy::Backend::new();
    let settings = Settings{ parallel : false, ..Default::default() };
    m.solve(&backend, & mut st, &settings, OverwritePolicy::Overwrite).unwrap();
    assert_eq!(backend.num_solved(), 2);

    // kept sub-problems are final and not solved again
    let report = m.solve(&backend, & mut st, &settings, OverwritePolicy::Keep).unwrap();
    assert_eq!(backend.num_solved(), 2);
    assert!(report.all_optimal());

    m.request_resolve();
    m.solve(&backend, & mut st, &settings, OverwritePolicy::Keep).unwrap();
    assert_eq!(backend.num_solved(), 4);
}

/// Fails every problem of sub-problem s1.
struct FailingS1 {
    inner : dummy::Backend,
}

impl SolverBackend for FailingS1 {
    fn name(&self) -> &str { "failing" }
    fn solve(&self, problem : &LinearProblem, options : &SolveOptions) -> Result<Solution> {
        if problem.name.contains("s1") {
            Err(ModelError::Solver("no license".to_string()))
        }
        else {
            self.inner.solve(problem, options)
        }
    }
}

#[test]
fn failure_is_isolated() {
    let mut m = model(&["Minimize(sum(x))"], &["x >= 0"]);
    let mut st = store(&m, 4);
    let report = m.solve(&FailingS1{ inner : dummy::Backend::new() }, & mut st, &Settings::default(), OverwritePolicy::Overwrite).unwrap();

    assert_eq!(report.failed().len(), 1);
    let s1 = SubProblemKey::new(vec![("S".to_string(),"s1".to_string())]);
    let s2 = SubProblemKey::new(vec![("S".to_string(),"s2".to_string())]);
    assert!(matches!(report.statuses[&("m".to_string(),s1)], Status::SolverError(_)));
    assert_eq!(report.statuses[&("m".to_string(),s2)], Status::Optimal);

    let values = m.variable_values("x").unwrap();
    assert_eq!(values["s1"], vec![None,None,None]);
    assert_eq!(values["s2"], vec![Some(0.0),Some(0.0),Some(0.0)]);
    assert!(m.variable_values("nope").is_err());
}

#[test]
fn singular_inverse_fails_sub_problem() {
    let mut sets = SetRegistry::new();
    sets.insert(Dimension::new("A", &["a1","a2"])).unwrap();
    sets.insert(Dimension::new("B", &["b1","b2"])).unwrap();
    let tables = vec![
        TableDecl::new("X", TableKind::Endogenous, &["B"]).with_variable(VariableDecl::new("x", Some("B"), None)),
        TableDecl::new("K", TableKind::Exogenous, &["A","B"]).with_variable(VariableDecl::new("K", Some("A"), Some("B"))),
    ];
    let sm = SymbolicModel::new().with_constraint("minv(K) @ x >= 0");
    let mut m = Model::from_parts(sets, tables, [("m".to_string(),sm)].into_iter().collect()).unwrap();
    let mut st = MemoryStore::new();
    m.initialize_storage(& mut st).unwrap();
    st.put_rows("K", vec![
        Row::new(&["a1","b1"], Some(1.0)), Row::new(&["a1","b2"], Some(2.0)),
        Row::new(&["a2","b1"], Some(2.0)), Row::new(&["a2","b2"], Some(4.0)),
    ], WriteMode::Insert).unwrap();

    let backend = dummy::Backend::new();
    let report = m.solve(&backend, & mut st, &Settings::default(), OverwritePolicy::Overwrite).unwrap();
    assert!(matches!(report.statuses.values().next(), Some(Status::SolverError(_))));
    assert_eq!(backend.num_solved(), 0);
}

#[test]
fn reload_dimension_items() {
    let mut m = model(&["Minimize(sum(x))"], &["x >= 0"]);
    let mut st = store(&m, 5);
    assert_eq!(m.catalog().num_columns(), 6);

    st.put_dimension_items("_set_A", &["a1".to_string(),"a2".to_string()]).unwrap();
    m.reload_dimension(&st, "A").unwrap();
    assert_eq!(m.sets().get("A").unwrap().len(), 2);
    assert_eq!(m.catalog().num_columns(), 4);
    assert!(m.problems().is_empty());

    let backend = dummy::Backend::new();
    m.solve(&backend, & mut st, &Settings::default(), OverwritePolicy::Keep).unwrap();
    assert!(backend.problems().iter().all(|p| p.num_columns() == 2));
}

fn weibull_model(constraint : &str) -> Model {
    let tables = vec![
        TableDecl::new("X", TableKind::Endogenous, &["A","S"]).with_variable(VariableDecl::new("x", Some("A"), None)),
        TableDecl::new("SC", TableKind::Exogenous, &["S"]).with_variable(VariableDecl::new("sc", None, None)),
        TableDecl::new("R", TableKind::Constant, &["A"]).with_variable(VariableDecl::new("r", Some("A"), None).with_value(ConstantKind::Arange1)),
    ];
    let sm = SymbolicModel::new().with_constraint(constraint);
    Model::from_parts(sets(), tables, [("m".to_string(),sm)].into_iter().collect()).unwrap()
}

fn weibull_store(m : &Model, s1 : f64, s2 : f64) -> MemoryStore {
    let mut st = MemoryStore::new();
    m.initialize_storage(& mut st).unwrap();
    st.put_rows("SC", vec![Row::new(&["s1"], Some(s1)),Row::new(&["s2"], Some(s2))], WriteMode::Insert).unwrap();
    st
}

#[test]
fn weibull_over_data() {
    let mut m = weibull_model("weib(sc, 2, r, 2) @ x >= 0");
    let mut st = weibull_store(&m, 5.0, 8.0);
    let backend = dummy::Backend::new();
    let report = m.solve(&backend, & mut st, &Settings{ parallel : false, ..Default::default() }, OverwritePolicy::Overwrite).unwrap();
    assert!(report.all_optimal());

    let ps = by_name(backend.problems());
    assert_eq!(ps.len(), 2);
    for p in ps.iter() {
        let sc = if p.name.contains("s1") { 5.0 } else { 8.0 };
        let w = symbolic::weibull(sc, 2.0, 3, 2).unwrap();
        assert_eq!(p.num_rows(), 3);
        // lower triangular: row i reads x[0..=i]
        assert_eq!(p.ptr, vec![0,1,3,6]);
        for i in 0..3 {
            let (js,cs) = p.row(i);
            assert_eq!(js, (0..=i).collect::<Vec<usize>>().as_slice());
            assert_eq!(cs, (0..=i).map(|j| w.get(i,j)).collect::<Vec<f64>>().as_slice());
        }
    }
    assert_ne!(ps[0].cof, ps[1].cof);
}

#[test]
fn weibull_bad_scale() {
    let mut m = weibull_model("weib(1e18, 2, r, 2) @ x >= 0");
    assert_eq!(m.build(OverwritePolicy::Overwrite).unwrap_err().kind(), ErrorKind::Expression);

    // a scale read from storage only fails its own sub-problem
    let mut m = weibull_model("weib(sc, 2, r, 2) @ x >= 0");
    let mut st = weibull_store(&m, 1e18, 5.0);
    let backend = dummy::Backend::new();
    let report = m.solve(&backend, & mut st, &Settings::default(), OverwritePolicy::Overwrite).unwrap();
    let s1 = SubProblemKey::new(vec![("S".to_string(),"s1".to_string())]);
    let s2 = SubProblemKey::new(vec![("S".to_string(),"s2".to_string())]);
    assert!(matches!(report.statuses[&("m".to_string(),s1)], Status::SolverError(_)));
    assert_eq!(report.statuses[&("m".to_string(),s2)], Status::Optimal);
    assert_eq!(backend.num_solved(), 1);
}
