//! Search criteria compiler and page envelope tests

use std::collections::BTreeMap;

use crediya_server::application::criteria::{
    BoundParam, CriteriaCompiler, PageResult, SearchCriteria, SortDirection,
};
use crediya_server::application::ApplicationError;

fn criteria(filters: &[(&str, &str)], page: u32, size: u32) -> SearchCriteria {
    SearchCriteria {
        filters: filters
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        sort_by: None,
        sort_direction: None,
        page,
        size,
    }
}

// ============================================================================
// Compiler
// ============================================================================

#[test]
fn test_caller_values_never_reach_sql_text() {
    let hostile = "x' OR '1'='1";
    let plan = CriteriaCompiler::for_applications(100)
        .compile(&criteria(&[("owner_ref", hostile)], 0, 10))
        .unwrap();

    assert!(!plan.data_sql().contains(hostile));
    assert!(!plan.count_plan().count_sql().contains(hostile));
    assert_eq!(plan.params(), &[BoundParam::Text(hostile.to_string())]);
}

#[test]
fn test_every_whitelisted_filter_compiles() {
    let plan = CriteriaCompiler::for_applications(100)
        .compile(&criteria(
            &[
                ("owner_ref", "ana@example.com"),
                ("loan_type_id", "1"),
                ("loan_status_id", "3"),
            ],
            0,
            10,
        ))
        .unwrap();

    assert_eq!(plan.filter_clauses().len(), 3);
    assert_eq!(plan.params().len(), 3);
    assert_eq!(plan.count_plan().params(), plan.params());
}

#[test]
fn test_first_invalid_key_fails_whole_request() {
    let compiler = CriteriaCompiler::for_applications(100);

    for key in ["base_salary", "email", "1=1", ""] {
        let err = compiler
            .compile(&criteria(&[("owner_ref", "ana@example.com"), (key, "1")], 0, 10))
            .unwrap_err();
        assert!(
            matches!(err, ApplicationError::InvalidFilterColumn(ref column) if column == key),
            "{key}: {err:?}"
        );
    }
}

#[test]
fn test_sortable_columns() {
    let compiler = CriteriaCompiler::for_applications(100);

    for column in ["application_id", "owner_ref", "loan_amount", "loan_term"] {
        let mut c = criteria(&[], 0, 10);
        c.sort_by = Some(column.to_string());
        c.sort_direction = Some("DESC".to_string());
        let plan = compiler.compile(&c).unwrap();
        let sort = plan.sort().unwrap();
        assert_eq!(sort.column, column);
        assert_eq!(sort.direction, SortDirection::Desc);
        assert!(plan.data_sql().contains(&format!("ORDER BY {column} DESC")));
    }

    let mut c = criteria(&[], 0, 10);
    c.sort_by = Some("   ".to_string());
    assert!(compiler.compile(&c).unwrap().sort().is_none());
}

#[test]
fn test_window_is_zero_based() {
    let compiler = CriteriaCompiler::for_applications(100);

    for (page, size, offset) in [(0, 10, 0), (1, 10, 10), (4, 25, 100), (7, 1, 7)] {
        let plan = compiler.compile(&criteria(&[], page, size)).unwrap();
        assert_eq!(plan.limit(), i64::from(size));
        assert_eq!(plan.offset(), offset);
    }
}

#[test]
fn test_sort_direction_parsing() {
    assert_eq!(SortDirection::parse_lenient(None), SortDirection::Asc);
    assert_eq!(SortDirection::parse_lenient(Some("asc")), SortDirection::Asc);
    assert_eq!(SortDirection::parse_lenient(Some(" desc ")), SortDirection::Desc);
    assert_eq!(SortDirection::parse_lenient(Some("down")), SortDirection::Asc);
}

// ============================================================================
// Page Envelope
// ============================================================================

#[test]
fn test_derived_fields_follow_stored_ones() {
    for total in [0u64, 1, 9, 10, 11, 99, 100, 101] {
        for size in [1u32, 3, 10, 50] {
            for current in 0u32..5 {
                let page = PageResult::new(Vec::<u8>::new(), total, current, size);
                let expected_pages = (total + u64::from(size) - 1) / u64::from(size);

                assert_eq!(page.total_pages(), expected_pages);
                assert_eq!(
                    page.has_next(),
                    expected_pages > 0 && u64::from(current) < expected_pages - 1
                );
                assert_eq!(page.has_previous(), current > 0);
            }
        }
    }
}

#[test]
fn test_single_result_page() {
    let page = PageResult::new(vec!["only"], 1, 0, 10);
    assert_eq!(page.total_pages(), 1);
    assert!(!page.has_next());
    assert!(!page.has_previous());
    assert_eq!(page.content(), &["only"]);
}

#[test]
fn test_empty_result_page() {
    let page = PageResult::new(Vec::<u8>::new(), 0, 0, 10);
    assert_eq!(page.total_pages(), 0);
    assert!(!page.has_next());
    assert!(!page.has_previous());
}
