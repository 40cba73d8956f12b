extern crate symodel;

use std::io::Write;
use symodel::*;

const MODEL : &str = r#"
sets:
  - symbol: S
    split_problem: true
    items: [s1, s2]
  - symbol: P
    items: [p1, p2, p3]
tables:
  - name: U
    type: {s1: endogenous, s2: exogenous}
    coordinates: [S]
    variables: [{symbol: u}]
  - name: V
    type: endogenous
    coordinates: [P, S]
    variables: [{symbol: v, rows: P}]
problems:
  supply:
    objective: ["Minimize(sum(v))"]
    expressions: ["v >= u"]
"#;

fn write_temp(dir : &tempfile::TempDir, name : &str, text : &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
    path
}

fn key(item : &str) -> SubProblemKey { SubProblemKey::new(vec![("S".to_string(),item.to_string())]) }

#[test]
fn model_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ModelConfig::from_file(write_temp(&dir, "model.yaml", MODEL)).unwrap();
    let settings = Settings::from_file(write_temp(&dir, "settings.yaml", "parallel: false\nround_digits: 3\n")).unwrap();
    assert!(! settings.parallel);

    let model = Model::new(cfg).unwrap();
    assert_eq!(model.sets().sub_problem_keys(), vec![key("s1"),key("s2")]);
    assert_eq!(model.tables().len(), 2);

    let e = ModelConfig::from_file(dir.path().join("missing.yaml")).unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Storage);
}

#[test]
fn invalid_model() {
    let cfg = ModelConfig::from_yaml_str(&MODEL.replace("rows: P", "rows: Q")).unwrap();
    assert_eq!(Model::new(cfg).err().unwrap().kind(), ErrorKind::Configuration);
    assert_eq!(ModelConfig::from_yaml_str("sets: 3").unwrap_err().kind(), ErrorKind::Configuration);
}

#[test]
fn table_kind_per_sub_problem() {
    let mut model = Model::new(ModelConfig::from_yaml_str(MODEL).unwrap()).unwrap();
    let mut store = MemoryStore::new();
    model.initialize_storage(& mut store).unwrap();
    store.put_rows("U", vec![Row::new(&["s2"], Some(3.0))], WriteMode::Replace).unwrap();

    let backend = dummy::Backend::new();
    let settings = Settings{ parallel : false, ..Default::default() };
    let report = model.solve(&backend, & mut store, &settings, OverwritePolicy::Overwrite).unwrap();
    assert!(report.all_optimal());
    assert!(report.statuses.contains_key(&("supply".to_string(),key("s2"))));

    let ps = backend.problems();
    // s1 decides u and v, s2 reads u
    assert_eq!(ps[0].num_columns(), 4);
    assert_eq!(ps[1].num_columns(), 3);
    assert_eq!(ps[1].lb, vec![3.0,3.0,3.0]);

    let u = store.get_rows("U", &Filter::new()).unwrap();
    assert_eq!(u, vec![Row::new(&["s1"], Some(0.0)),Row::new(&["s2"], Some(3.0))]);
}

#[test]
fn store_persistence() {
    let mut model = Model::new(ModelConfig::from_yaml_str(MODEL).unwrap()).unwrap();
    let mut store = MemoryStore::new();
    model.initialize_storage(& mut store).unwrap();
    store.put_rows("U", vec![Row::new(&["s2"], Some(1.5))], WriteMode::Replace).unwrap();
    model.solve(&dummy::Backend::new(), & mut store, &Settings::default(), OverwritePolicy::Overwrite).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    store.save(&path).unwrap();
    let loaded = MemoryStore::load(&path).unwrap();
    assert_eq!(loaded.list_tables(), store.list_tables());
    assert_eq!(loaded.get_rows("V", &Filter::new()).unwrap(), store.get_rows("V", &Filter::new()).unwrap());
    assert_eq!(loaded.list_dimension_items("_set_P").unwrap(), vec!["p1","p2","p3"]);
}

#[test]
fn shared_storage() {
    let mut model = Model::new(ModelConfig::from_yaml_str(MODEL).unwrap()).unwrap();
    let mut shared = SharedStorage::new(MemoryStore::new());
    model.initialize_storage(& mut shared).unwrap();
    shared.put_rows("U", vec![Row::new(&["s2"], Some(2.0))], WriteMode::Replace).unwrap();

    let reader = shared.clone();
    model.solve(&dummy::Backend::new(), & mut shared, &Settings::default(), OverwritePolicy::Overwrite).unwrap();

    let counts : Vec<usize> = std::thread::scope(|s| {
        let hs : Vec<_> = ["U","V"].iter()
            .map(|t| { let r = reader.clone(); s.spawn(move || r.get_rows(t, &Filter::new()).unwrap().len()) })
            .collect();
        hs.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![2,6]);
    assert_eq!(reader.read().get_rows("V", &Filter::new()).unwrap().iter().filter(|r| r.value == Some(0.0)).count(), 6);
}
