mod common;

use chrono::{Duration, Utc};
use common::{job, raw, setup_pool};
use sea_jobs::db::{self, JobFilters, PageRequest, SortField, SortOrder};
use serde_json::json;

#[tokio::test]
async fn insert_is_idempotent() {
    let pool = setup_pool().await;
    let records = vec![
        job("https://jobs/1", "Backend Engineer", "Singapore"),
        job("https://jobs/2", "Data Analyst", "Jakarta, Indonesia"),
        job("https://jobs/3", "Developer", "Bangkok"),
    ];

    let first = db::insert_jobs(&pool, &records, 2).await.unwrap();
    assert_eq!(first.inserted, 3);
    assert_eq!(first.duplicates, 0);

    let second = db::insert_jobs(&pool, &records, 2).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 3);
    assert_eq!(db::count_jobs(&pool).await.unwrap(), 3);
}

#[tokio::test]
async fn same_url_on_other_site_is_a_new_job() {
    let pool = setup_pool().await;
    let mut linkedin = job("https://jobs/1", "Backend Engineer", "Singapore");
    linkedin.insert("site".into(), json!("linkedin"));
    let records = vec![job("https://jobs/1", "Backend Engineer", "Singapore"), linkedin];
    let report = db::insert_jobs(&pool, &records, 50).await.unwrap();
    assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn off_region_and_missing_location_are_skipped() {
    let pool = setup_pool().await;
    let records = vec![
        job("https://jobs/1", "Engineer", "New York, NY"),
        raw(json!({ "site": "indeed", "job_url": "https://jobs/2", "title": "Engineer" })),
        job("https://jobs/3", "Engineer", "Remote - Kuala Lumpur"),
    ];
    let report = db::insert_jobs(&pool, &records, 50).await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.off_region, 2);
}

#[tokio::test]
async fn empty_insert_is_a_no_op() {
    let pool = setup_pool().await;
    let report = db::insert_jobs(&pool, &[], 50).await.unwrap();
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn pagination_keeps_total_stable() {
    let pool = setup_pool().await;
    let records: Vec<_> = (0..25)
        .map(|i| job(&format!("https://jobs/{i}"), &format!("Engineer {i:02}"), "Singapore"))
        .collect();
    db::insert_jobs(&pool, &records, 10).await.unwrap();

    let filters = JobFilters {
        sort_by: SortField::Title,
        sort_order: SortOrder::Asc,
        ..Default::default()
    };
    let mut seen = Vec::new();
    for (page, expected_len) in [(1, 10), (2, 10), (3, 5), (4, 0)] {
        let (jobs, total) = db::search_jobs(&pool, &filters, PageRequest::new(page, 10, 200))
            .await
            .unwrap();
        assert_eq!(total, 25);
        assert_eq!(jobs.len(), expected_len);
        seen.extend(jobs.into_iter().map(|j| j.job.title));
    }
    let mut sorted = seen.clone();
    sorted.sort();
    assert_eq!(seen, sorted);
    assert_eq!(seen.len(), 25);

    let (jobs, total) = db::search_jobs(&pool, &filters, PageRequest::new(1, 7, 200))
        .await
        .unwrap();
    assert_eq!(total, 25);
    assert_eq!(jobs.len(), 7);
}

#[tokio::test]
async fn salary_range_matches_either_bound() {
    let pool = setup_pool().await;
    let mut record = job("https://jobs/1", "Engineer", "Singapore");
    record.insert("min_amount".into(), json!(1000));
    record.insert("max_amount".into(), json!(2000));
    db::insert_jobs(&pool, &[record], 50).await.unwrap();

    let page = PageRequest::new(1, 20, 200);
    for filters in [
        JobFilters {
            min_salary: Some(1500.0),
            ..Default::default()
        },
        JobFilters {
            max_salary: Some(1500.0),
            ..Default::default()
        },
    ] {
        let (_, total) = db::search_jobs(&pool, &filters, page).await.unwrap();
        assert_eq!(total, 1, "{filters:?}");
    }

    let too_high = JobFilters {
        min_salary: Some(2500.0),
        ..Default::default()
    };
    let (_, total) = db::search_jobs(&pool, &too_high, page).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn text_country_and_remote_filters() {
    let pool = setup_pool().await;
    let mut remote = job("https://jobs/1", "Senior Rust Engineer", "Hanoi");
    remote.insert("is_remote".into(), json!(true));
    let records = vec![
        remote,
        job("https://jobs/2", "Data Analyst", "Ho Chi Minh City, Vietnam"),
        job("https://jobs/3", "Rust Developer", "Singapore"),
        job("https://jobs/4", "100% Remote_Lead", "Singapore"),
    ];
    db::insert_jobs(&pool, &records, 50).await.unwrap();
    let page = PageRequest::new(1, 20, 200);

    let by_country = JobFilters {
        country: Some("Vietnam".into()),
        ..Default::default()
    };
    assert_eq!(db::search_jobs(&pool, &by_country, page).await.unwrap().1, 2);

    let by_title = JobFilters {
        title: Some("rust".into()),
        ..Default::default()
    };
    assert_eq!(db::search_jobs(&pool, &by_title, page).await.unwrap().1, 2);

    let literal_percent = JobFilters {
        title: Some("100%".into()),
        ..Default::default()
    };
    assert_eq!(db::search_jobs(&pool, &literal_percent, page).await.unwrap().1, 1);

    let remote_only = JobFilters {
        is_remote: Some(true),
        ..Default::default()
    };
    let (jobs, total) = db::search_jobs(&pool, &remote_only, page).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(jobs[0].job.job_url, "https://jobs/1");

    let recent = JobFilters {
        days_old: Some(1),
        site: Some("indeed".into()),
        ..Default::default()
    };
    assert_eq!(db::search_jobs(&pool, &recent, page).await.unwrap().1, 4);
}

#[tokio::test]
async fn statistics_on_empty_store() {
    let pool = setup_pool().await;
    let stats = db::statistics(&pool).await.unwrap();
    assert_eq!(stats.total_jobs, 0);
    assert_eq!(stats.remote_percentage, 0.0);
    assert!(stats.jobs_by_country.is_empty());
    assert!(stats.jobs_by_site.is_empty());
    assert_eq!(stats.salary_stats, Default::default());
}

#[tokio::test]
async fn statistics_use_country_aliases() {
    let pool = setup_pool().await;
    let mut paid = job("https://jobs/1", "Engineer", "Singapore");
    paid.insert("min_amount".into(), json!(1000));
    paid.insert("max_amount".into(), json!(2000));
    paid.insert("is_remote".into(), json!("yes"));
    let mut linkedin = job("https://jobs/3", "Engineer", "Penang");
    linkedin.insert("site".into(), json!("linkedin"));
    let records = vec![
        paid,
        job("https://jobs/2", "Engineer", "Kuala Lumpur"),
        linkedin,
    ];
    db::insert_jobs(&pool, &records, 50).await.unwrap();

    let stats = db::statistics(&pool).await.unwrap();
    assert_eq!(stats.total_jobs, 3);
    assert_eq!(stats.jobs_by_country[0].country, "Malaysia");
    assert_eq!(stats.jobs_by_country[0].count, 2);
    assert_eq!(stats.jobs_by_country[1].country, "Singapore");
    assert_eq!(stats.jobs_by_site[0].site, "indeed");
    assert_eq!(stats.jobs_by_site[0].count, 2);
    assert_eq!(stats.remote_percentage, 33.3);
    assert_eq!(stats.salary_stats.jobs_with_salary, 1);
    assert_eq!(stats.salary_stats.avg_min_salary, 1000.0);
    assert_eq!(stats.salary_stats.max_salary, 2000.0);
    assert_eq!(stats.salary_stats.percentage_with_salary, 33.3);
}

#[tokio::test]
async fn cleanup_removes_only_stale_jobs() {
    let pool = setup_pool().await;
    let records = vec![
        job("https://jobs/old", "Engineer", "Singapore"),
        job("https://jobs/new", "Engineer", "Singapore"),
    ];
    db::insert_jobs(&pool, &records, 50).await.unwrap();
    for (url, days) in [("https://jobs/old", 20), ("https://jobs/new", 1)] {
        sqlx::query("UPDATE jobs SET scraped_at = ? WHERE job_url = ?")
            .bind(db::to_sql_ts(Utc::now() - Duration::days(days)))
            .bind(url)
            .execute(&pool)
            .await
            .unwrap();
    }

    assert_eq!(db::cleanup_older_than(&pool, 14).await.unwrap(), 1);
    let (jobs, total) = db::search_jobs(&pool, &JobFilters::default(), PageRequest::new(1, 20, 200))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(jobs[0].job.job_url, "https://jobs/new");
}

#[tokio::test]
async fn out_of_range_retention_is_an_error() {
    let pool = setup_pool().await;
    db::insert_jobs(&pool, &[job("https://jobs/1", "Engineer", "Singapore")], 50)
        .await
        .unwrap();

    let err = db::cleanup_older_than(&pool, u32::MAX).await.unwrap_err();
    assert!(err.to_string().contains("out of range"));
    assert_eq!(db::count_jobs(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn huge_days_old_means_no_recency_bound() {
    let pool = setup_pool().await;
    db::insert_jobs(&pool, &[job("https://jobs/1", "Engineer", "Singapore")], 50)
        .await
        .unwrap();
    let filters = JobFilters {
        days_old: Some(u32::MAX),
        ..Default::default()
    };
    let (_, total) = db::search_jobs(&pool, &filters, PageRequest::new(1, 20, 200))
        .await
        .unwrap();
    assert_eq!(total, 1);
}

#[tokio::test]
async fn filter_options_are_sorted_and_distinct() {
    let pool = setup_pool().await;
    let mut other = job("https://jobs/2", "Engineer", "Bangkok");
    other.insert("company".into(), json!("Zeta"));
    other.insert("job_type".into(), json!("fulltime"));
    let mut no_company = raw(json!({
        "site": "linkedin",
        "job_url": "https://jobs/3",
        "title": "Engineer",
        "location": "Bangkok",
    }));
    no_company.insert("job_type".into(), json!("contract"));
    let records = vec![job("https://jobs/1", "Engineer", "Singapore"), other, no_company];
    db::insert_jobs(&pool, &records, 50).await.unwrap();

    let options = db::distinct_filter_values(&pool).await.unwrap();
    assert_eq!(options.companies, vec!["Acme", "Zeta"]);
    assert_eq!(options.locations, vec!["Bangkok", "Singapore"]);
    assert_eq!(options.job_types, vec!["contract", "fulltime"]);
    assert_eq!(options.sites, vec!["indeed", "linkedin"]);
}
