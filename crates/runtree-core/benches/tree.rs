use criterion::{black_box, criterion_group, criterion_main, Criterion};

use runtree_core::{body, SuiteId, TestStatus, TestTree};

/// `files` file suites, each with `depth` nested suites holding `width` tests.
fn build_tree(files: usize, depth: usize, width: usize) -> TestTree {
    let mut tree = TestTree::new();
    for f in 0..files {
        let file = format!("spec{f}.rs");
        let mut parent: SuiteId = tree.add_file_suite(&file);
        for d in 0..depth {
            parent = tree.add_suite(parent, format!("level {d}"), &file, format!("{file}:{d}"));
            for w in 0..width {
                let test = tree.add_test(
                    parent,
                    format!("case {w}"),
                    &file,
                    format!("{file}:{d}:{w}"),
                    body(|| async { anyhow::Ok(()) }),
                );
                if w % 5 == 0 {
                    tree.runnable_mut(test).flaky(());
                }
                let t = tree.test_mut(test);
                t.append_result().status = Some(TestStatus::Failed);
                t.append_result().status = Some(TestStatus::Passed);
            }
        }
    }
    tree
}

fn bench_identity(c: &mut Criterion) {
    let mut tree = build_tree(20, 5, 20);
    let root = tree.root();

    c.bench_function("renumber_and_assign_ids_2000_tests", |b| {
        b.iter(|| {
            tree.renumber(root);
            tree.assign_ids(root);
            black_box(tree.ids_valid(root))
        })
    });
}

fn bench_verdicts(c: &mut Criterion) {
    let tree = build_tree(20, 5, 20);
    let root = tree.root();

    c.bench_function("ok_over_all_tests", |b| {
        b.iter(|| {
            let mut passing = 0usize;
            tree.find_test(root, |id, _| {
                if tree.ok(id) {
                    passing += 1;
                }
                false
            });
            black_box(passing)
        })
    });

    c.bench_function("annotations_deepest_tests", |b| {
        b.iter(|| {
            let mut total = 0usize;
            tree.find_test(root, |id, _| {
                total += tree.annotations(id).len();
                false
            });
            black_box(total)
        })
    });
}

criterion_group!(benches, bench_identity, bench_verdicts);
criterion_main!(benches);
