use std::cmp::Ordering;
use std::sync::Arc;

use canonica::{
    domains::integer::{Integer, Z},
    poly::{
        accumulator::TermAccumulatorPool, monomial::Monomial, polynomial::Polynomial,
        store::MonomialStore, term::Term, Exponent, GradedLexOrder, LexOrder, MonomialOrder,
        Variable, VariableType,
    },
    state::VariableRegistry,
};
use rand::{seq::SliceRandom, thread_rng, Rng};

fn variables(n: usize) -> (VariableRegistry, Vec<Variable>) {
    let registry = VariableRegistry::new();
    let vars = (0..n)
        .map(|_| registry.fresh_variable(VariableType::Real))
        .collect();
    (registry, vars)
}

#[test]
fn consecutive_ids_and_canonical_monomials() {
    let (_registry, vars) = variables(2);
    let (x, y) = (vars[0], vars[1]);
    assert_eq!(y.id(), x.id() + 1);

    let store = MonomialStore::new();
    let a = store.intern_pairs(&[(x, 2)]);
    let b = store.intern_pairs(&[(x, 1), (x, 1)]);
    assert_eq!(a, b);
    assert_eq!(store.tdeg(a.unwrap()), 2);
}

#[test]
fn construction_order_is_irrelevant() {
    let (_registry, vars) = variables(6);
    let store = MonomialStore::new();
    let mut rng = thread_rng();

    for _ in 0..50 {
        let mut pairs: Vec<_> = vars
            .iter()
            .filter_map(|v| rng.gen_bool(0.6).then(|| (*v, rng.gen_range(1..5))))
            .collect();

        // split some exponents into several entries
        let mut split = vec![];
        for (v, e) in &pairs {
            if *e > 1 {
                split.push((*v, 1));
                split.push((*v, e - 1));
            } else {
                split.push((*v, *e));
            }
        }

        let reference = store.intern_pairs(&pairs);
        for _ in 0..5 {
            pairs.shuffle(&mut rng);
            split.shuffle(&mut rng);
            assert_eq!(store.intern_pairs(&pairs), reference);
            assert_eq!(store.intern_pairs(&split), reference);
        }
    }
}

#[test]
fn multiplication_is_commutative_and_associative() {
    let (_registry, vars) = variables(4);
    let store = MonomialStore::new();
    let mut rng = thread_rng();

    let random = |rng: &mut rand::rngs::ThreadRng| {
        let pairs: Vec<_> = vars.iter().map(|v| (*v, rng.gen_range(0..3))).collect();
        store.intern_pairs(&pairs)
    };

    for _ in 0..100 {
        let (a, b, c) = (random(&mut rng), random(&mut rng), random(&mut rng));
        assert_eq!(store.mul(a, b), store.mul(b, a));

        let ab = store.mul(a, b);
        let bc = store.mul(b, c);
        assert_eq!(store.mul(ab, c), store.mul(a, bc));

        let ab = store.mul(a, b);
        assert_eq!(store.divide(ab, b), Some(a));
        assert!(store.divide(store.lcm(a, b), store.gcd(a, b)).is_some());
    }
}

#[test]
fn operations_agree_with_exponents() {
    let (_registry, vars) = variables(3);
    let store = MonomialStore::new();
    let mut rng = thread_rng();

    for _ in 0..100 {
        let ea: Vec<u32> = (0..3).map(|_| rng.gen_range(0..4)).collect();
        let eb: Vec<u32> = (0..3).map(|_| rng.gen_range(0..4)).collect();
        let mono = |e: &[u32]| {
            let pairs: Vec<_> = vars.iter().cloned().zip(e.iter().cloned()).collect();
            store.intern_pairs(&pairs)
        };

        let (a, b) = (mono(&ea), mono(&eb));
        let lcm: Vec<_> = ea.iter().zip(&eb).map(|(x, y)| *x.max(y)).collect();
        let gcd: Vec<_> = ea.iter().zip(&eb).map(|(x, y)| *x.min(y)).collect();
        assert_eq!(store.lcm(a, b), mono(&lcm));
        assert_eq!(store.gcd(a, b), mono(&gcd));

        let divisible = ea.iter().zip(&eb).all(|(x, y)| x >= y);
        match store.divide(a, b) {
            Some(q) => {
                assert!(divisible);
                let diff: Vec<_> = ea.iter().zip(&eb).map(|(x, y)| x - y).collect();
                assert_eq!(q, mono(&diff));
            }
            None => assert!(!divisible),
        }
    }
}

fn check_strict_weak_order<O: MonomialOrder>(monomials: &[Monomial]) {
    for a in monomials {
        assert_eq!(O::cmp(a, a), Ordering::Equal);
        for b in monomials {
            let ab = O::cmp(a, b);
            assert_eq!(ab, O::cmp(b, a).reverse());
            if a != b {
                assert_ne!(ab, Ordering::Equal);
            }

            for c in monomials {
                if ab == Ordering::Less && O::cmp(b, c) == Ordering::Less {
                    assert_eq!(O::cmp(a, c), Ordering::Less);
                }
            }
        }
    }
}

#[test]
fn orders_are_strict_weak_orders() {
    let (_registry, vars) = variables(3);
    let mut monomials = vec![];
    for i in 0..3 {
        for j in 0..3 {
            for k in 0..2 {
                monomials.push(Monomial::from_unsorted([
                    (vars[0], i),
                    (vars[1], j),
                    (vars[2], k),
                ]));
            }
        }
    }

    check_strict_weak_order::<LexOrder>(&monomials);
    check_strict_weak_order::<GradedLexOrder>(&monomials);

    // the identity is the least monomial
    let one = Monomial::one();
    for m in &monomials[1..] {
        assert_eq!(LexOrder::cmp(&one, m), Ordering::Less);
        assert_eq!(GradedLexOrder::cmp(&one, m), Ordering::Less);
    }
}

#[test]
fn ranks_change_the_lexical_order() {
    let (_registry, vars) = variables(2);
    let (x, y) = (vars[0], vars[1]);
    let store = MonomialStore::new();

    let mx = store.intern_variable(x, 1);
    let my = store.intern_variable(y, 1);
    assert_eq!(store.compare_lexical(mx, my), Ordering::Greater);

    // a higher rank moves x after y
    let store = MonomialStore::new();
    let xr = x.with_rank(1);
    let mx = store.intern_variable(xr, 1);
    let my = store.intern_variable(y, 1);
    assert_eq!(store.compare_lexical(mx, my), Ordering::Less);
}

#[test]
fn accumulator_cancellation_scenario() {
    let (_registry, vars) = variables(2);
    let (x, y) = (vars[0], vars[1]);
    let store = Arc::new(MonomialStore::new());
    let mut pool = TermAccumulatorPool::new(Z, store.clone());

    let xy = store.intern_pairs(&[(x, 1), (y, 1)]);
    store.retain(xy.unwrap());

    let mut input = vec![
        Term::new(Integer::new(3), xy),
        Term::new(Integer::new(-3), xy),
        Term::constant(Integer::new(5)),
    ];

    for _ in 0..3 {
        input.shuffle(&mut thread_rng());
        for t in &input {
            if let Some(m) = t.monomial {
                store.retain(m);
            }
        }

        let id = pool.checkout(input.len());
        for t in &input {
            pool.add_term(id, t.clone());
        }
        assert_eq!(pool.read_terms(id), vec![Term::constant(Integer::new(5))]);
    }
}

fn poly(store: &Arc<MonomialStore>, terms: &[(i64, &[(Variable, Exponent)])]) -> Polynomial<Z> {
    Polynomial::from_terms(
        Z,
        store.clone(),
        terms
            .iter()
            .map(|(c, m)| Term::new(Integer::new(*c), store.intern_pairs(m)))
            .collect(),
    )
}

#[test]
fn polynomial_product_with_cancellation() {
    let (_registry, vars) = variables(3);
    let store = Arc::new(MonomialStore::new());
    let mut pool = TermAccumulatorPool::with_size(Z, store.clone(), 2);

    let (x, y, z) = (vars[0], vars[1], vars[2]);

    // (x^2 + x*y + y^2) * (x - y) = x^3 - y^3
    let a = poly(&store, &[(1, &[(x, 2)]), (1, &[(x, 1), (y, 1)]), (1, &[(y, 2)])]);
    let b = poly(&store, &[(1, &[(x, 1)]), (-1, &[(y, 1)])]);
    let expected = poly(&store, &[(1, &[(x, 3)]), (-1, &[(y, 3)])]);
    assert_eq!(a.mul_with_pool(&b, &mut pool), expected);
    assert_eq!(&b * &a, expected);

    // (x + z + 1)^2 - (x + z)^2 - 2*(x + z) = 1
    let s = poly(&store, &[(1, &[(x, 1)]), (1, &[(z, 1)])]);
    let s1 = &s + &Polynomial::one(Z, store.clone());
    let lhs = &(&s1.pow_with_pool(2, &mut pool) - &s.pow_with_pool(2, &mut pool))
        - &s.mul_coefficient(&Integer::new(2));
    assert_eq!(lhs, Polynomial::one(Z, store.clone()));
    assert_eq!(pool.num_checked_out(), 0);
}

#[test]
fn references_are_reclaimed() {
    let (_registry, vars) = variables(2);
    let store = Arc::new(MonomialStore::new());

    {
        let x = Polynomial::<_>::variable(Z, store.clone(), vars[0]);
        let y = Polynomial::<_>::variable(Z, store.clone(), vars[1]);
        let s = &x + &y;
        let _p = &(&s * &s) * &s;
    }

    let largest = store.largest_id();
    assert_eq!(store.purge(), largest);
    assert!(store.is_empty());

    // ids are reused after a purge
    let m = store.intern_variable(vars[0], 7).unwrap();
    assert!(m.index() < largest);
    assert_eq!(store.largest_id(), largest);
}

#[test]
fn concurrent_interning_agrees() {
    let (_registry, vars) = variables(3);
    let store = Arc::new(MonomialStore::new());

    let results: Vec<Vec<_>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let vars = vars.clone();
                s.spawn(move || {
                    let mut rng = thread_rng();
                    let mut out = vec![];
                    for i in 0..3u32 {
                        for j in 0..3u32 {
                            let mut pairs = vec![(vars[0], i), (vars[1], j), (vars[2], 1)];
                            pairs.shuffle(&mut rng);
                            out.push(store.intern_pairs(&pairs));
                        }
                    }
                    out
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for r in &results[1..] {
        assert_eq!(r, &results[0]);
    }
    assert_eq!(store.len(), 9);
}
