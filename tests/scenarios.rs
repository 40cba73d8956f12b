extern crate symodel;

use std::sync::atomic::{AtomicUsize,Ordering};
use symodel::*;
use symodel::symbolic::NodeKind;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn registry(dims : &[(&str,&[&str],bool)]) -> SetRegistry {
    let mut r = SetRegistry::new();
    for (id,items,split) in dims {
        let d = Dimension::new(id, items);
        r.insert(if *split { d.splitting() } else { d }).unwrap();
    }
    r
}

fn binding_of(n : &symbolic::Node) -> usize {
    match n.kind {
        NodeKind::Binding(b) => b,
        ref k => panic!("expected a binding, got {:?}",k)
    }
}

#[test]
fn resolve_matrix_variable() {
    init_logging();
    let sets = registry(&[("A",&["a1","a2"],false),("B",&["b1","b2"],false)]);
    let t = TableDecl::new("T", TableKind::Exogenous, &["A","B"]).with_variable(VariableDecl::new("X", Some("A"), Some("B")));
    let cat = VariableCatalog::build(&[t], &sets).unwrap();
    let x = cat.variable("X").unwrap();
    assert_eq!(x.shape, [2,2]);
    assert_eq!(x.coords.intra, None);
    assert!(x.coords.inter.is_empty());
    assert_eq!(cat.bindings_of("X").len(), 1);
}

#[test]
fn splitting_dimension_gives_sub_problems() {
    init_logging();
    let sets = registry(&[("A",&["a1","a2"],false),("B",&["b1","b2"],false),("S",&["s1","s2"],true)]);
    let t = TableDecl::new("T", TableKind::Endogenous, &["A","B","S"]).with_variable(VariableDecl::new("X", Some("A"), Some("B")));
    let cat = VariableCatalog::build(&[t], &sets).unwrap();
    let model = SymbolicModel::new().with_constraint("X >= 0");
    let ps = ProblemBuilder::new(&cat, &sets).build("m", &model).unwrap();

    assert_eq!(ps.keys().map(|k| k.label()).collect::<Vec<_>>(), vec!["s1","s2"]);
    for (key,p) in ps.iter() {
        assert_eq!(p.constraints.len(), 1);
        let ConcreteForm::Constraint{ lhs, .. } = &p.constraints[0].form else { panic!("expected a constraint") };
        let b = cat.binding(binding_of(lhs));
        assert_eq!(b.filter["S"], vec![key.item("S").unwrap().to_string()]);
        assert_eq!(b.shape, [2,2]);
    }
}

#[test]
fn intra_dimension_replicates_expression() {
    init_logging();
    let sets = registry(&[("A",&["a1","a2"],false),("C",&["c1","c2","c3"],false)]);
    let tables = vec![
        TableDecl::new("X", TableKind::Endogenous, &["A","C"]).with_variable(VariableDecl::new("x", Some("A"), None)),
        TableDecl::new("Y", TableKind::Endogenous, &["A"]).with_variable(VariableDecl::new("y", Some("A"), None)),
    ];
    let cat = VariableCatalog::build(&tables, &sets).unwrap();
    let res = ExpressionCompiler::new(&cat).compile("x + y", &SubProblemKey::default_key()).unwrap();
    assert_eq!(res.len(), 3);

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (e,item) in res.iter().zip(["c1","c2","c3"]) {
        assert_eq!(e.intra.as_deref(), Some(item));
        let ConcreteForm::Value(n) = &e.form else { panic!("expected a value") };
        let symbolic::NodeKind::Add(l,r) = &n.kind else { panic!("expected a sum") };
        xs.push(binding_of(l));
        ys.push(binding_of(r));
        assert_eq!(cat.binding(binding_of(l)).intra.as_deref(), Some(item));
    }
    assert!(ys.iter().all(|&b| b == ys[0]));
    xs.dedup();
    assert_eq!(xs.len(), 3);
}

/// Answers every sub-problem with a value that depends on the iteration: each iteration solves
/// two sub-problems.
struct Scripted {
    calls  : AtomicUsize,
    values : Vec<f64>,
}

impl SolverBackend for Scripted {
    fn name(&self) -> &str { "scripted" }
    fn solve(&self, problem : &LinearProblem, _options : &SolveOptions) -> Result<Solution> {
        let it = self.calls.fetch_add(1, Ordering::SeqCst) / 2;
        let v = self.values[it.min(self.values.len()-1)];
        Ok(Solution::optimal(problem, vec![v; problem.num_columns()]))
    }
}

fn coupled_model() -> (Model,MemoryStore) {
    let sets = registry(&[("S",&["s1","s2"],true)]);
    let tables = vec![ TableDecl::new("X", TableKind::Endogenous, &["S"]).with_variable(VariableDecl::new("x", None, None)) ];
    let sm = SymbolicModel::new().with_objective("Minimize(x)").with_constraint("x >= 0");
    let model = Model::from_parts(sets, tables, [("m".to_string(),sm)].into_iter().collect()).unwrap();
    let mut store = MemoryStore::new();
    model.initialize_storage(& mut store).unwrap();
    store.put_rows("X", vec![Row::new(&["s1"], Some(1.0)),Row::new(&["s2"], Some(1.0))], WriteMode::Replace).unwrap();
    (model,store)
}

#[test]
fn integrated_solve_converges() {
    init_logging();
    let (mut model,mut store) = coupled_model();
    let backend = Scripted{ calls : AtomicUsize::new(0), values : vec![1.1, 1.155, 1.155*1.005] };
    let settings = Settings{ integrated : true, tolerance : 0.01, max_iterations : 5, parallel : false, ..Default::default() };
    let report = model.solve(&backend, & mut store, &settings, OverwritePolicy::Overwrite).unwrap();

    let conv = report.convergence.as_ref().unwrap();
    assert_eq!(conv.outcome, convergence::Outcome::Converged{ iterations : 3 });
    let diffs : Vec<f64> = conv.history.iter().map(|r| r.max_difference()).collect();
    assert!((diffs[0]-0.1).abs() < 1e-4);
    assert!((diffs[1]-0.05).abs() < 1e-4);
    assert!((diffs[2]-0.005).abs() < 1e-4);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
    assert!(report.all_optimal());
}

#[test]
fn integrated_solve_iteration_limit() {
    init_logging();
    let (mut model,mut store) = coupled_model();
    let backend = Scripted{ calls : AtomicUsize::new(0), values : vec![2.0, 4.0, 8.0, 16.0] };
    let settings = Settings{ integrated : true, tolerance : 0.01, max_iterations : 3, parallel : false, ..Default::default() };
    let report = model.solve(&backend, & mut store, &settings, OverwritePolicy::Overwrite).unwrap();
    assert_eq!(report.convergence.unwrap().outcome, convergence::Outcome::MaxIterations{ iterations : 3 });
    // last iterate is kept
    let rows = store.get_rows("X", &Filter::new()).unwrap();
    assert!(rows.iter().all(|r| r.value == Some(8.0)));
}

#[test]
fn identity_constant() {
    init_logging();
    let sets = registry(&[("A",&["a1","a2"],false),("B",&["b1","b2","b3"],false)]);
    let t = TableDecl::new("I", TableKind::Constant, &["A","B"])
        .with_variable(VariableDecl::new("I", Some("A"), Some("B")).with_value(ConstantKind::Identity));
    let e = VariableCatalog::build(&[t], &sets).err().unwrap();
    assert_eq!(e.kind(), ErrorKind::ConceptualModel);

    let t = TableDecl::new("I", TableKind::Constant, &["B"])
        .with_variable(VariableDecl::new("I", Some("B"), Some("B")).with_value(ConstantKind::Identity));
    let cat = VariableCatalog::build(&[t], &sets).unwrap();
    let b = cat.binding(cat.bindings_of("I")[0]);
    let BindingValue::Constant(c) = b.value else { panic!("expected a constant") };
    let m = cat.constant(c);
    assert_eq!(m.shape(), [3,3]);
    assert_eq!(m.to_vec(), matrix::eye(3).to_vec());
}
