//! Lab 05: banner grabbing and matching versions to CVEs.

use super::{clear_rule, Difficulty, Lab, LabError, LabMeta};
use crate::console::rules::predicates::*;
use crate::console::{Command, Predicate, Response, Rule};
use crate::missions::Step;

pub(super) const META: LabMeta = LabMeta {
    id: 5,
    slug: "lab05",
    title: "El-Basaama",
    subtitle: "Banner Grabbing & CVE Analysis",
    description: "Grab service banners with netcat and telnet, pin down exact software versions \
                  and cross-reference them against known CVEs.",
    difficulty: Difficulty::Advanced,
    points: 250,
    total_steps: 10,
    cwd: "~/banners",
};

const TARGET: &str = "192.168.1.5";

const VOCABULARY: &[&str] = &[
    "help",
    "nc",
    "netcat",
    "curl",
    "telnet",
    "searchsploit",
    "whatweb",
    "nikto",
    "clear",
    "history",
];

pub(super) fn build() -> Result<Lab, LabError> {
    Lab::assemble(META.id, rules(), steps(), VOCABULARY)
}

fn netcat() -> Predicate {
    any(vec![cmd("nc"), cmd("netcat")])
}

/// `nc <TARGET> <port>`.
fn grab(port: &'static str) -> Predicate {
    netcat().and(arg(TARGET)).and(arg(port))
}

fn apache_query() -> Predicate {
    cmd("searchsploit")
        .and(contains("apache"))
        .and(contains("2.4"))
}

fn ssh_query() -> Predicate {
    cmd("searchsploit").and(contains("ssh")).and_not(contains("apache"))
}

fn steps() -> Vec<Step> {
    vec![
        Step::on_command(1, grab("80"))
            .title("Banner Grab via Netcat")
            .objective("Connect to port 80 with netcat and grab the HTTP server banner.")
            .hint("nc 192.168.1.5 80")
            .solution("nc 192.168.1.5 80"),
        Step::on_command(2, grab("22"))
            .title("SSH Banner Grab")
            .objective("Grab the SSH banner on port 22 to get the exact OpenSSH version.")
            .hint("nc 192.168.1.5 22")
            .solution("nc 192.168.1.5 22"),
        Step::on_command(3, grab("21"))
            .title("FTP Banner Grab")
            .objective("Read the FTP banner and check whether anonymous login works.")
            .hint("nc 192.168.1.5 21")
            .solution("nc 192.168.1.5 21"),
        Step::on_command(4, cmd("curl").and(flag_ci("-I")).and(contains(TARGET)))
            .title("HTTP Header Inspection")
            .objective("Use curl -I to inspect the response headers for version leaks.")
            .hint("curl -I http://192.168.1.5")
            .solution("curl -I http://192.168.1.5"),
        Step::on_command(5, cmd("telnet").and(arg(TARGET)).and(arg("23")))
            .title("Telnet Banner Grab")
            .objective("Check whether telnet is listening on port 23. It sends everything in plaintext.")
            .hint("telnet 192.168.1.5 23")
            .solution("telnet 192.168.1.5 23"),
        Step::on_command(6, apache_query())
            .title("CVE Lookup: Apache")
            .objective("Search the local exploit database for Apache 2.4.38 vulnerabilities.")
            .hint("searchsploit apache 2.4.38")
            .solution("searchsploit apache 2.4.38"),
        Step::on_command(7, ssh_query())
            .title("CVE Deep Dive: OpenSSH")
            .objective("Look up OpenSSH 7.9 vulnerabilities and compare their severity scores.")
            .hint("searchsploit openssh 7.9")
            .solution("searchsploit openssh 7.9"),
        Step::on_command(8, grab("25"))
            .title("Check SMTP Banner")
            .objective("Grab the mail server banner and test for SMTP user enumeration.")
            .hint("nc 192.168.1.5 25")
            .solution("nc 192.168.1.5 25"),
        Step::on_command(9, cmd("whatweb").and(any(vec![contains(TARGET), no_args()])))
            .title("WhatWeb Service Fingerprinting")
            .objective("Run WhatWeb to identify every web technology in one shot.")
            .hint("whatweb http://192.168.1.5")
            .solution("whatweb http://192.168.1.5"),
        Step::on_command(10, cmd("nikto").and(flag("-h")))
            .title("Build CVE Attack Map")
            .objective("Run a full nikto scan to match banners to known vulnerabilities.")
            .hint("nikto -h http://192.168.1.5")
            .solution("nikto -h http://192.168.1.5"),
    ]
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::fixed("help", cmd("help"), help()).example("help"),
        Rule::render("nc-http", netcat().and(arg("80")), nc_http).example("nc 192.168.1.5 80"),
        Rule::render("nc-ssh", netcat().and(arg("22")), nc_ssh).example("netcat 192.168.1.5 22"),
        Rule::render("nc-ftp", netcat().and(arg("21")), nc_ftp).example("nc 192.168.1.5 21"),
        Rule::render("nc-smtp", netcat().and(arg("25")), nc_smtp).example("nc 192.168.1.5 25"),
        Rule::render("nc-other", netcat(), nc_other).example("nc 192.168.1.5 8443"),
        Rule::fixed("curl-headers", cmd("curl").and(flag_ci("-I")), headers())
            .example("curl -I http://192.168.1.5"),
        Rule::fixed(
            "curl-usage",
            cmd("curl"),
            Response::lines(["Try: curl -I http://192.168.1.5  (headers only)"]),
        )
        .example("curl http://192.168.1.5"),
        Rule::render("telnet-open", cmd("telnet").and(arg("23")), telnet_open)
            .example("telnet 192.168.1.5 23"),
        Rule::render("telnet-closed", cmd("telnet"), telnet_closed).example("telnet 192.168.1.5 80"),
        Rule::fixed("searchsploit-apache", apache_query(), apache_exploits())
            .example("searchsploit apache 2.4.38"),
        Rule::render("searchsploit-ssh", ssh_query(), ssh_exploits)
            .example("searchsploit openssh 7.9"),
        Rule::render("searchsploit-other", cmd("searchsploit"), no_exploits)
            .example("searchsploit wordpress"),
        Rule::render("whatweb", cmd("whatweb"), whatweb).example("whatweb http://192.168.1.5"),
        Rule::fixed("nikto", cmd("nikto").and(flag("-h")), nikto()).example("nikto -h http://192.168.1.5"),
        Rule::fixed(
            "nikto-usage",
            cmd("nikto"),
            Response::lines(["Usage: nikto -h http://192.168.1.5"]).error(),
        )
        .example("nikto"),
        Rule::fixed(
            "history",
            cmd("history"),
            Response::lines([
                "    1  nc 192.168.1.5 80",
                "    2  nc 192.168.1.5 22",
                "    3  curl -I http://192.168.1.5",
                "    4  history",
            ]),
        )
        .example("history"),
        clear_rule(),
    ]
}

fn help() -> Response {
    Response::lines([
        "Cyber-Masry Banner Grabbing Lab  -  Help Menu",
        "[SIMULATED ENVIRONMENT - EDUCATIONAL USE ONLY]",
        "",
        "  nc <ip> <port>                   Netcat banner grab",
        "  curl -I http://<ip>              HTTP header inspection",
        "  telnet <ip> <port>               Telnet banner grab",
        "  searchsploit <service> <version> Search exploit database",
        "  whatweb http://<ip>              Web technology fingerprint",
        "  nikto -h http://<ip>             Full web vulnerability scan",
        "  clear                            Clear terminal",
        "",
        "  Target: 192.168.1.5",
    ])
}

fn host(cmd: &Command) -> &str {
    cmd.target().unwrap_or(TARGET)
}

fn nc_http(cmd: &Command) -> Response {
    Response::lines([
        format!("Connecting to {}:80...", host(cmd)),
        String::new(),
        "HTTP/1.1 200 OK".to_string(),
        "Server: Apache/2.4.38 (Debian)".to_string(),
        "X-Powered-By: PHP/7.4.3".to_string(),
        "Content-Type: text/html; charset=UTF-8".to_string(),
        String::new(),
        "[+] Banner captured!".to_string(),
        "[!] Apache/2.4.38: CVE-2019-0211 (CVSS 7.8), local privilege escalation".to_string(),
        "[!] PHP/7.4.3: end of life, no more security patches".to_string(),
    ])
    .with_note(
        "The Server header names the exact software and version. Apache 2.4.38 carries \
         CVE-2019-0211, which lets a CGI script escalate from www-data to root.",
        "الـ Server header بيكشف Apache/2.4.38.. معلومة تكفي تلاقي CVEs مباشرة",
    )
}

fn nc_ssh(cmd: &Command) -> Response {
    Response::lines([
        format!("Connecting to {}:22...", host(cmd)),
        String::new(),
        "SSH-2.0-OpenSSH_7.9p1 Debian-10+deb10u2".to_string(),
        String::new(),
        "[+] SSH banner captured!".to_string(),
        "[+] Version: OpenSSH 7.9p1".to_string(),
        "[+] OS fingerprint: Debian 10 (Buster)".to_string(),
        String::new(),
        "[!] CVE-2018-15473 (CVSS 5.3): username enumeration".to_string(),
        "[!] CVE-2019-6111 (CVSS 5.9): scp path traversal".to_string(),
        "[*] Use: searchsploit openssh 7.9".to_string(),
    ])
    .with_note(
        "The SSH banner leaks the distribution release as well as the OpenSSH version. \
         CVE-2018-15473 lets an attacker confirm valid usernames without credentials.",
        "SSH banner بيكشف OpenSSH version وحتى distro الـ Linux",
    )
}

fn nc_ftp(cmd: &Command) -> Response {
    Response::lines([
        format!("Connecting to {}:21...", host(cmd)),
        String::new(),
        "220 (vsFTPd 3.0.3)".to_string(),
        String::new(),
        "Testing anonymous login...".to_string(),
        "> USER anonymous".to_string(),
        "230 Login successful.".to_string(),
        "> LIST".to_string(),
        "-rw-r--r--    1 0    0    1842 Jan 01 2024 backup.zip".to_string(),
        "-rw-r--r--    1 0    0     512 Jan 01 2024 readme.txt".to_string(),
        String::new(),
        "[+] ANONYMOUS LOGIN ENABLED!".to_string(),
        "[!] backup.zip in public FTP: possible source code leak".to_string(),
    ])
    .with_note(
        "Anonymous FTP lets anyone list and download files. vsFTPd 2.3.4 once shipped with a \
         backdoor; 3.0.3 is not affected, but the open share is a finding on its own.",
        "Anonymous FTP login = أي حد يقدر يدخل",
    )
}

fn nc_smtp(cmd: &Command) -> Response {
    Response::lines([
        format!("Connecting to {}:25...", host(cmd)),
        String::new(),
        "220 evilcorp.com ESMTP Postfix (Ubuntu)".to_string(),
        "VRFY admin".to_string(),
        "252 2.0.0 admin".to_string(),
        "VRFY omar.badran".to_string(),
        "252 2.0.0 omar.badran".to_string(),
        "VRFY nonexistent".to_string(),
        "550 5.1.1 nonexistent: Recipient address rejected".to_string(),
        String::new(),
        "[!] VRFY enabled: username enumeration possible!".to_string(),
        "[!] Confirmed users: admin, omar.badran".to_string(),
    ])
    .with_note(
        "VRFY confirms whether a mailbox exists, which hands attackers a list of targets for \
         phishing. Postfix can disable it with disable_vrfy_command.",
        "SMTP VRFY بيأكدلك لو user موجود",
    )
}

fn nc_other(cmd: &Command) -> Response {
    let port = cmd.args.get(1).and_then(|p| p.parse::<u16>().ok());
    match (cmd.target(), port) {
        (Some(ip), Some(port)) => Response::lines([
            format!("Connecting to {}:{}...", ip, port),
            "Connection established.".to_string(),
            String::new(),
            format!("[*] No banner received on port {}", port),
            format!(
                "[*] Service may use TLS: try openssl s_client -connect {}:{}",
                ip, port
            ),
        ]),
        _ => Response::lines(["Usage: nc <ip> <port>"]).error(),
    }
}

fn headers() -> Response {
    Response::lines([
        "HTTP/1.1 200 OK",
        "Server: Apache/2.4.38 (Debian)",
        "X-Powered-By: PHP/7.4.3",
        "Content-Type: text/html; charset=UTF-8",
        "X-Frame-Options: SAMEORIGIN",
        "X-Content-Type-Options: nosniff",
        "",
        "[+] HTTP headers captured",
        "[!] Missing security headers: Content-Security-Policy, HSTS",
        "[!] X-Powered-By should be removed (leaks PHP version)",
    ])
    .with_note(
        "Server and X-Powered-By should not reach production. Missing CSP and HSTS headers \
         leave room for XSS and protocol downgrades.",
        "X-Powered-By: PHP/7.4.3 مش المفروض يظهر",
    )
}

fn telnet_open(cmd: &Command) -> Response {
    let ip = host(cmd);
    Response::lines([
        format!("Trying {}...", ip),
        format!("Connected to {}.", ip),
        "Escape character is '^]'.".to_string(),
        String::new(),
        "EvilCorp Internal System".to_string(),
        "Telnet Server v1.0".to_string(),
        String::new(),
        "login: ".to_string(),
        String::new(),
        "[!] TELNET IS RUNNING ON THIS SERVER!".to_string(),
        "[!] Every keystroke, passwords included, crosses the network in plaintext".to_string(),
    ])
    .with_note(
        "Anyone sniffing the segment sees telnet credentials as they are typed. SSH replaced \
         it decades ago; finding it in production is a critical finding.",
        "Telnet بيبعت الـ password plaintext",
    )
}

fn telnet_closed(cmd: &Command) -> Response {
    let port = cmd.args.get(1).map_or("23", String::as_str);
    Response::lines([
        format!("Trying {}:{}...", host(cmd), port),
        "telnet: Unable to connect to remote host: Connection refused".to_string(),
        format!("[*] Port {} is closed", port),
    ])
}

fn apache_exploits() -> Response {
    Response::lines([
        "Exploit Database: searchsploit results for Apache 2.4.x",
        "",
        "  Title                                          | Path",
        "  -----------------------------------------------+---------------------------",
        "  Apache 2.4.17 < 2.4.38 - HTTP/2 DoS            | linux/dos/46521.py",
        "  Apache 2.4.x - mod_rewrite Open Redirect       | multiple/webapps/47689.txt",
        "  Apache 2.4.38 - local privilege escalation     | linux/local/51193.sh",
        "  (CVE-2019-0211)",
        "",
        "[+] 3 exploits found",
        "[!] CVE-2019-0211 (CVSS 7.8): www-data can escalate to root",
        "[+] To copy exploit: searchsploit -m linux/local/51193.sh",
    ])
    .with_note(
        "searchsploit queries an offline mirror of Exploit-DB. With a web shell as www-data, \
         CVE-2019-0211 turns into root.",
        "CVE-2019-0211 بيرقي صلاحية www-data لـ root",
    )
}

fn ssh_exploits(cmd: &Command) -> Response {
    let version = if cmd.lowered.contains("7.9") { "7.9" } else { "7.x" };
    Response::lines([
        format!("Exploit Database: searchsploit results for OpenSSH {}", version),
        String::new(),
        "  Title                                          | Path".to_string(),
        "  -----------------------------------------------+---------------------------".to_string(),
        "  OpenSSH 7.7 < 7.9 - Username Enumeration       | linux/remote/45939.py".to_string(),
        "  (CVE-2018-15473)".to_string(),
        "  OpenSSH 7.9 - scp Client Escape Characters     | unix/remote/46193.txt".to_string(),
        "  (CVE-2019-6111)".to_string(),
        String::new(),
        "[+] 2 exploits found".to_string(),
        "[!] Recommended: upgrade to OpenSSH 9.x".to_string(),
    ])
    .with_note(
        "CVE-2018-15473 is a timing attack: valid usernames take measurably longer to reject. \
         The resulting list feeds targeted brute force.",
        "CVE-2018-15473 timing attack.. بتقيس الوقت وبتعرف اسم المستخدم",
    )
}

fn no_exploits(cmd: &Command) -> Response {
    let query = cmd.args.join(" ");
    Response::lines([
        format!("searchsploit: Searching for \"{}\"...", query),
        String::new(),
        "[*] No specific exploits found for this query.".to_string(),
        "[*] Try: searchsploit apache 2.4.38  or  searchsploit openssh 7.9".to_string(),
    ])
}

fn whatweb(cmd: &Command) -> Response {
    let url = cmd.target().unwrap_or("http://192.168.1.5");
    Response::lines([
        format!("WhatWeb v0.5.5: {}", url),
        String::new(),
        "http://192.168.1.5 [200 OK]".to_string(),
        "  Apache[2.4.38]".to_string(),
        "  PHP[7.4.3]".to_string(),
        "  WordPress[5.8.1]".to_string(),
        "  jQuery[3.5.1]".to_string(),
        "  Email: admin@evilcorp.com".to_string(),
        String::new(),
        "[+] Full fingerprint complete!".to_string(),
        "[!] WordPress 5.8.1: many security releases behind".to_string(),
        "[!] jQuery 3.5.1: CVE-2020-11022/11023 (XSS via HTML)".to_string(),
    ])
    .with_note(
        "WhatWeb combines headers, meta tags, script names and cookies to fingerprint a site. \
         One run maps most of the web attack surface.",
        "WhatWeb بيشوف كل حاجة دفعة واحدة",
    )
}

fn nikto() -> Response {
    Response::lines([
        "Nikto v2.1.6: Web Vulnerability Scanner",
        "Target: http://192.168.1.5",
        "",
        "- Server: Apache/2.4.38 (Debian)",
        "+ The anti-clickjacking X-Frame-Options header is not set",
        "+ OSVDB-3092: /phpmyadmin/: phpMyAdmin was found",
        "+ OSVDB-3268: /backup/: Directory indexing found",
        "+ /phpinfo.php: PHP info file found",
        "+ /wp-login.php: WordPress login page found",
        "+ Apache/2.4.38 appears to be outdated (current: 2.4.57)",
        "+ PHP/7.4.3 appears to be outdated (current: 8.2)",
        "",
        "+ 7 items reported on remote host",
        "",
        "FLAG{Banner_Grab_CVE_Master}",
    ])
    .with_note(
        "Nikto checks thousands of known dangerous files, outdated versions and header \
         problems. It is the usual last automated pass before manual exploitation.",
        "Nikto فحص كل حاجة دفعة واحدة",
    )
}
