use avatar_policy::{CertificateNames, HeaderRule, HostPolicy, evaluate_trust};
use rcgen::{CertificateParams, DnType, KeyPair};

fn certificate(common_name: &str, alt_names: &[&str]) -> Vec<u8> {
    let alt_names: Vec<String> = alt_names.iter().map(|s| s.to_string()).collect();
    let mut params = CertificateParams::new(alt_names).expect("valid alt names");
    params.distinguished_name.push(DnType::CommonName, common_name);
    let key = KeyPair::generate().expect("key generation");
    params.self_signed(&key).expect("self-signed cert").der().to_vec()
}

#[test]
fn trusted_host_accepts_matching_alt_name_despite_chain_failure() {
    let policy = HostPolicy::default();
    let der = certificate("unrelated", &["*.githubusercontent.com"]);

    assert!(evaluate_trust(&policy, "avatars.githubusercontent.com", &der, false));
}

#[test]
fn trusted_host_accepts_matching_subject() {
    let policy = HostPolicy::default();
    let der = certificate("avatars.githubusercontent.com", &[]);

    assert!(evaluate_trust(&policy, "avatars.githubusercontent.com", &der, false));
}

#[test]
fn trusted_host_rejects_certificate_for_other_domain() {
    let policy = HostPolicy::default();
    let der = certificate("example.org", &["www.example.org"]);

    assert!(!evaluate_trust(&policy, "avatars.githubusercontent.com", &der, false));
    assert!(!evaluate_trust(&policy, "avatars.githubusercontent.com", &der, true));
}

#[test]
fn untrusted_host_never_widens_or_narrows() {
    let policy = HostPolicy::default();
    let matching = certificate("cdn.example.com", &["cdn.example.com"]);
    let foreign = certificate("other.org", &[]);

    for der in [&matching, &foreign] {
        assert!(evaluate_trust(&policy, "cdn.example.com", der, true));
        assert!(!evaluate_trust(&policy, "cdn.example.com", der, false));
    }
}

#[test]
fn host_case_and_trailing_dot_are_normalised() {
    let policy = HostPolicy::default();
    let der = certificate("x", &["avatars.githubusercontent.com"]);

    assert!(evaluate_trust(&policy, "Avatars.GitHubUserContent.com.", &der, false));
}

#[test]
fn names_are_extracted_lowercased() {
    let der = certificate("Avatars.Example.COM", &["A.Example.com", "b.example.com"]);
    let names = CertificateNames::parse(&der).unwrap();

    assert!(names.subject.contains("avatars.example.com"));
    assert_eq!(names.alt_names, vec!["a.example.com", "b.example.com"]);
}

#[test]
fn extra_trusted_host_uses_the_same_rule() {
    let policy = HostPolicy::default().trusted_host("img.example.net");
    let der = certificate("img.example.net", &[]);

    assert!(evaluate_trust(&policy, "img.example.net", &der, false));
}

#[test]
fn policy_loads_from_toml() {
    let policy: HostPolicy = toml::from_str(
        r#"
        user_agent = "avatars/1.0"
        trusted_hosts = ["cdn.example.com"]

        [[rules]]
        host_contains = ["example.com"]
        headers = [["Referer", "https://example.com/"]]
        "#,
    )
    .unwrap();

    assert_eq!(policy.user_agent, "avatars/1.0");
    assert!(policy.is_trusted_host("cdn.example.com"));
    assert!(!policy.is_trusted_host("avatars.githubusercontent.com"));
    assert_eq!(
        policy.rules,
        vec![HeaderRule::new(&["example.com"], &[("Referer", "https://example.com/")])]
    );
    assert_eq!(
        policy.headers_for("https://cdn.example.com/a.png"),
        vec![
            ("User-Agent".to_string(), "avatars/1.0".to_string()),
            ("Referer".to_string(), "https://example.com/".to_string()),
        ]
    );
}

#[test]
fn empty_toml_yields_default_table() {
    let policy: HostPolicy = toml::from_str("").unwrap();
    assert_eq!(policy, HostPolicy::default());
}
