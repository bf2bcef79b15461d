//! Lab 03: web content discovery with gobuster.
//!
//! Step and rule predicates here match substrings of the lower-cased line,
//! so `-t` also hits `-t50` and a wordlist named `admin-paths.txt` counts as
//! an admin scan. The dir branches are ordered so each of them is reachable
//! from its own example.

use super::{clear_rule, Difficulty, Lab, LabError, LabMeta};
use crate::console::rules::predicates::*;
use crate::console::{Command, Predicate, Response, Rule};
use crate::missions::Step;

pub(super) const META: LabMeta = LabMeta {
    id: 3,
    slug: "lab03",
    title: "El-Daraaj El-Serry",
    subtitle: "Directory & File Enumeration with Gobuster",
    description: "Brute-force hidden paths, files and subdomains on a web server to map the \
                  attack surface nobody linked to.",
    difficulty: Difficulty::Intermediate,
    points: 175,
    total_steps: 10,
    cwd: "~/enum",
};

const TARGET_IP: &str = "192.168.1.5";
const TARGET_URL: &str = "http://192.168.1.5";
const DEFAULT_WORDLIST: &str = "common.txt";

const VOCABULARY: &[&str] = &["help", "gobuster", "curl", "ping", "clear", "history"];

pub(super) fn build() -> Result<Lab, LabError> {
    Lab::assemble(META.id, rules(), steps(), VOCABULARY)
}

fn dir_scan() -> Predicate {
    cmd("gobuster").and(contains("gobuster dir"))
}

fn dir_at_target() -> Predicate {
    dir_scan().and(contains(TARGET_IP))
}

fn steps() -> Vec<Step> {
    vec![
        Step::on_command(
            1,
            dir_at_target().and_not(any(vec![
                contains("-x"),
                contains("-v"),
                contains("-t"),
                contains("--delay"),
                contains("-o"),
                contains("/api"),
                contains("admin"),
            ])),
        )
        .title("Basic Directory Scan")
        .objective("Run a plain directory scan against the target with the common wordlist.")
        .hint("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt")
        .solution("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt"),
        Step::on_command(
            2,
            dir_at_target()
                .and(contains("-x"))
                .and_not(any(vec![contains("bak"), contains("admin")])),
        )
        .title("Scan with Extensions")
        .objective("Append file extensions with -x to find scripts and text files, not just folders.")
        .hint("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -x php,html,txt")
        .solution(
            "gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -x php,html,txt",
        ),
        Step::on_command(3, dir_at_target().and(contains("admin")))
            .title("Find the Admin Panel")
            .objective("Switch to a specialised admin wordlist to locate the login panel.")
            .hint("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/admin-paths.txt")
            .solution("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/admin-paths.txt"),
        Step::on_command(
            4,
            dir_at_target()
                .and(contains("-v"))
                .and_not(any(vec![contains("-t"), contains("--delay"), contains("-o")])),
        )
        .title("Verbose Mode (Status Codes)")
        .objective("Show every status code with -v. A 403 still proves the path exists.")
        .hint("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -v")
        .solution("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -v"),
        Step::on_command(5, dir_at_target().and(contains("-t")))
            .title("Dirbuster with Threads")
            .objective("Raise concurrency with -t and compare the scan time.")
            .hint("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -t 50")
            .solution("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -t 50"),
        Step::on_command(6, cmd("gobuster").and(contains("gobuster dns")))
            .title("DNS Subdomain Enumeration")
            .objective("Switch to dns mode and enumerate subdomains of evilcorp.com.")
            .hint("gobuster dns -d evilcorp.com -w /usr/share/wordlists/subdomains.txt")
            .solution("gobuster dns -d evilcorp.com -w /usr/share/wordlists/subdomains.txt"),
        Step::on_command(7, dir_scan().and(contains("/api")))
            .title("Scan API Endpoints")
            .objective("Point gobuster at /api with an API wordlist and the json extension.")
            .hint("gobuster dir -u http://192.168.1.5/api -w /usr/share/wordlists/api-paths.txt -x json")
            .solution(
                "gobuster dir -u http://192.168.1.5/api -w /usr/share/wordlists/api-paths.txt -x json",
            ),
        Step::on_command(8, dir_scan().and(contains("-x")).and(contains("bak")))
            .title("Find Backup Files")
            .objective("Hunt for forgotten backups and dumps with backup extensions.")
            .hint(
                "gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -x bak,old,zip,sql",
            )
            .solution(
                "gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -x bak,old,zip,sql",
            ),
        Step::on_command(9, dir_scan().and(contains("--delay")))
            .title("Full Stealth Scan")
            .objective("Slow the scan down with --delay so rate limiters stay quiet.")
            .hint("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt --delay 200ms")
            .solution(
                "gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt --delay 200ms",
            ),
        Step::on_command(10, dir_scan().and(contains("-o")))
            .title("Full Recon Report")
            .objective("Write the findings to a report file with -o.")
            .hint(
                "gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -o /tmp/gobuster-report.txt",
            )
            .solution(
                "gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -o /tmp/gobuster-report.txt",
            ),
    ]
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::fixed("help", cmd("help"), help()).example("help"),
        Rule::render("gobuster-dns", cmd("gobuster").and(arg("dns")), dns_scan)
            .example("gobuster dns -d evilcorp.com -w /usr/share/wordlists/subdomains.txt"),
        Rule::render("gobuster-bad-mode", cmd("gobuster").and_not(arg("dir")), bad_mode)
            .example("gobuster vhost -u http://192.168.1.5"),
        Rule::render(
            "gobuster-basic",
            dir_at_target().and_not(any(vec![
                contains("-x"),
                contains("-v"),
                contains("-t"),
                contains("--delay"),
                contains("-o"),
                contains("/api"),
                contains("admin"),
            ])),
            basic_scan,
        )
        .example("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt"),
        Rule::render(
            "gobuster-extensions",
            dir_at_target()
                .and(contains("-x"))
                .and_not(any(vec![contains("bak"), contains("admin")])),
            extension_scan,
        )
        .example("gobuster dir -u http://192.168.1.5 -w common.txt -x php,html,txt"),
        Rule::fixed("gobuster-admin", dir_at_target().and(contains("admin")), admin_scan())
            .example("gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/admin-paths.txt"),
        Rule::fixed(
            "gobuster-verbose",
            dir_at_target()
                .and(contains("-v"))
                .and_not(any(vec![contains("-t"), contains("--delay"), contains("-o")])),
            verbose_scan(),
        )
        .example("gobuster dir -u http://192.168.1.5 -w common.txt -v"),
        Rule::render("gobuster-threads", dir_at_target().and(contains("-t")), threaded_scan)
            .example("gobuster dir -u http://192.168.1.5 -w common.txt -t 50"),
        Rule::fixed("gobuster-api", dir_at_target().and(contains("/api")), api_scan())
            .example("gobuster dir -u http://192.168.1.5/api -w /usr/share/wordlists/api-paths.txt"),
        Rule::fixed(
            "gobuster-backups",
            dir_at_target().and(contains("-x")).and(contains("bak")),
            backup_scan(),
        )
        .example("gobuster dir -u http://192.168.1.5 -w common.txt -x bak,old,zip,sql"),
        Rule::fixed("gobuster-stealth", dir_at_target().and(contains("--delay")), stealth_scan())
            .example("gobuster dir -u http://192.168.1.5 -w common.txt --delay 200ms"),
        Rule::fixed("gobuster-report", dir_at_target().and(contains("-o")), report_scan())
            .example("gobuster dir -u http://192.168.1.5 -w common.txt -o /tmp/gobuster-report.txt"),
        Rule::render("gobuster-other", cmd("gobuster"), other_host)
            .example("gobuster dir -u http://10.0.0.9 -w common.txt"),
        Rule::render("curl", cmd("curl"), curl).example("curl http://192.168.1.5"),
        Rule::fixed(
            "ping",
            cmd("ping"),
            Response::lines([
                "PING 192.168.1.5 56(84) bytes of data.",
                "64 bytes from 192.168.1.5: icmp_seq=1 ttl=64 time=0.38ms",
                "[!] Host is up: proceed with web enumeration",
            ]),
        )
        .example("ping 192.168.1.5"),
        Rule::fixed("history", cmd("history"), history()).example("history"),
        clear_rule(),
    ]
}

fn help() -> Response {
    Response::lines([
        "Cyber-Masry Enumeration Lab  -  Help Menu",
        "[SIMULATED ENVIRONMENT - EDUCATIONAL USE ONLY]",
        "",
        "  gobuster dir -u <url> -w <wordlist>      Directory brute-force",
        "  gobuster dir ... -x php,html,txt         Add file extensions",
        "  gobuster dir ... -v                      Verbose status codes",
        "  gobuster dir ... -t <n>                  Concurrent threads",
        "  gobuster dir ... --delay <ms>            Slow, stealthy scan",
        "  gobuster dir ... -o <file>               Save results",
        "  gobuster dns -d <domain> -w <wordlist>   Subdomain brute-force",
        "  curl [-I] <url>                          Fetch a page or headers",
        "  ping <ip>                                Host check",
        "  clear                                    Clear terminal",
        "",
        "  Mission target: http://192.168.1.5",
        "  Start with:  gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt",
    ])
}

fn wordlist(cmd: &Command) -> &str {
    cmd.value_after("-w").unwrap_or(DEFAULT_WORDLIST)
}

fn dns_scan(cmd: &Command) -> Response {
    Response::lines([
        "Gobuster v3.6  by OJ Reeves".to_string(),
        "[+] Domain:     evilcorp.com".to_string(),
        "[+] Threads:    10".to_string(),
        format!("[+] Wordlist:   {}", wordlist(cmd)),
        String::new(),
        "===============================================================".to_string(),
        "Starting gobuster in DNS enumeration mode".to_string(),
        "===============================================================".to_string(),
        "Found: www.evilcorp.com".to_string(),
        "Found: mail.evilcorp.com".to_string(),
        "Found: dev.evilcorp.com        <- development server!".to_string(),
        "Found: staging.evilcorp.com    <- staging env (often less secure)".to_string(),
        "Found: admin.evilcorp.com      <- admin subdomain!".to_string(),
        "Found: api.evilcorp.com".to_string(),
        "Found: vpn.evilcorp.com".to_string(),
        String::new(),
        "Finished: 7 subdomains found in 4.23s".to_string(),
        String::new(),
        "[!] dev.evilcorp.com: dev servers often skip security".to_string(),
        "[!] staging.evilcorp.com: staging may hold production DB creds".to_string(),
    ])
    .with_note(
        "Subdomain enumeration reveals the whole attack surface. Dev and staging environments \
         often run with real credentials and relaxed security, and a forgotten subdomain is a \
         classic way in.",
        "بيئة الـ dev والـ staging غالباً أمانها أقل بكتير من الـ production",
    )
}

fn bad_mode(cmd: &Command) -> Response {
    match cmd.target() {
        Some(mode) => Response::lines([format!(
            "gobuster: unknown mode '{}'. Use 'dir' or 'dns'.",
            mode
        )])
        .error(),
        None => Response::lines(["Usage: gobuster dir -u <url> -w <wordlist>"]).error(),
    }
}

fn basic_scan(cmd: &Command) -> Response {
    Response::lines([
        "Gobuster v3.6  by OJ Reeves".to_string(),
        format!("[+] Url:          {}", TARGET_URL),
        "[+] Threads:      10".to_string(),
        format!("[+] Wordlist:     {}", wordlist(cmd)),
        "[+] Status codes: 200,204,301,302,307,401,403".to_string(),
        String::new(),
        "===============================================================".to_string(),
        "Starting gobuster in DIR enumeration mode".to_string(),
        "===============================================================".to_string(),
        "/images               (Status: 301) [Size: 178]".to_string(),
        "/uploads              (Status: 301) [Size: 181]".to_string(),
        "/admin                (Status: 403) [Size: 288]   <- interesting".to_string(),
        "/backup               (Status: 301) [Size: 179]   <- interesting".to_string(),
        "/config               (Status: 403) [Size: 291]   <- interesting".to_string(),
        "/server-status        (Status: 403) [Size: 298]".to_string(),
        "/phpmyadmin           (Status: 200) [Size: 10531] <- CRITICAL".to_string(),
        String::new(),
        "Finished: 8 results found".to_string(),
        String::new(),
        "[!] /phpmyadmin exposed! Try default creds: root / (empty)".to_string(),
        "[!] /admin returns 403, but the path exists".to_string(),
    ])
    .with_note(
        "Gobuster requests every word in the list and reads the status code. 403 means the path \
         exists but is forbidden. An exposed phpMyAdmin is the big finding here.",
        "phpMyAdmin مكشوف = بوابة للـ database بالكامل",
    )
}

fn extension_scan(cmd: &Command) -> Response {
    let exts = cmd.value_after("-x").unwrap_or("php,html,txt");
    Response::lines([
        "Gobuster v3.6  by OJ Reeves".to_string(),
        format!("[+] Extensions: {}", exts),
        String::new(),
        "===============================================================".to_string(),
        "/index.html            (Status: 200) [Size: 2847]".to_string(),
        "/index.php             (Status: 200) [Size: 3012]".to_string(),
        "/config.php            (Status: 200) [Size: 0]     <- config file".to_string(),
        "/backup.txt            (Status: 200) [Size: 1842]  <- FOUND".to_string(),
        "/admin.php             (Status: 302) [Redirect: /login.php]".to_string(),
        "/install.php           (Status: 200) [Size: 4230]  <- installer!".to_string(),
        "/phpinfo.php           (Status: 200) [Size: 89432] <- CRITICAL".to_string(),
        String::new(),
        format!("Finished: scanning {} extensions", exts),
        String::new(),
        "[!] phpinfo.php leaks PHP version, server config and env vars".to_string(),
        "[!] install.php: web app installer still accessible".to_string(),
    ])
    .with_note(
        "phpinfo.php leaks the PHP build, server config and sometimes database passwords in \
         environment variables. A leftover install.php lets anyone re-install the app with \
         their own admin account.",
        "phpinfo.php دي كنز معلومات للـ hacker",
    )
}

fn admin_scan() -> Response {
    Response::lines([
        "Gobuster v3.6  by OJ Reeves",
        "[+] Wordlist: admin-paths.txt (specialized admin wordlist)",
        "",
        "===============================================================",
        "/admin                 (Status: 403) [Size: 288]",
        "/admin/login           (Status: 200) [Size: 4821]  <- LOGIN PAGE",
        "/admin/dashboard       (Status: 302) -> /admin/login",
        "/administrator         (Status: 301) [Size: 189]",
        "/wp-admin              (Status: 200) [Size: 7420]  <- WordPress",
        "/manager/html          (Status: 401) [Size: 2047]  <- Tomcat",
        "",
        "Finished: Admin panel located!",
        "",
        "[!] /admin/login found! Try default creds: admin/admin",
        "[!] Tomcat /manager/html: default creds tomcat/tomcat",
    ])
    .with_note(
        "A dedicated admin wordlist finds panels generic lists miss. Tomcat Manager with default \
         credentials lets an attacker deploy a WAR file and run code on the server.",
        "Tomcat Manager بالـ default creds = RCE مباشرة",
    )
}

fn verbose_scan() -> Response {
    Response::lines([
        "Gobuster v3.6  (verbose: showing all results including 403)",
        "",
        "===============================================================",
        "/images         (Status: 301)",
        "/css            (Status: 301)",
        "/admin          (Status: 403) <- forbidden but exists",
        "/config         (Status: 403) <- forbidden but exists",
        "/backup         (Status: 301)",
        "/phpmyadmin     (Status: 200) <- open",
        "/.htaccess      (Status: 403) <- Apache config",
        "/.git           (Status: 301) <- GIT REPO EXPOSED",
        "",
        "Finished: 8 paths",
        "",
        "[!] /.git exposed! Run: git-dumper http://192.168.1.5 ./dumped-repo",
    ])
    .with_note(
        "An exposed .git directory hands over the full source history, including credentials \
         that were committed and later deleted.",
        ".git مكشوف = source code كامل بتاريخه",
    )
}

fn threaded_scan(cmd: &Command) -> Response {
    let threads = cmd.value_after("-t").unwrap_or("50");
    let speedup = threads.parse::<u32>().map_or(5, |n| (n / 10).max(1));
    Response::lines([
        format!("Gobuster v3.6  ({} concurrent threads)", threads),
        String::new(),
        "Progress: [====================================] 100%".to_string(),
        String::new(),
        "/images               (Status: 301)".to_string(),
        "/uploads              (Status: 301)".to_string(),
        "/admin                (Status: 403)".to_string(),
        "/backup               (Status: 301)".to_string(),
        "/phpmyadmin           (Status: 200)".to_string(),
        String::new(),
        "Finished in 0.89 seconds  (vs 9.2s with 1 thread)".to_string(),
        String::new(),
        format!("[!] {} threads = {}x faster", threads, speedup),
        "[!] High thread counts may trigger rate limiting or IDS alerts".to_string(),
    ])
    .with_note(
        format!(
            "With {} threads gobuster sends that many requests at once. Faster, but much louder. \
             10 to 50 is the usual range for authorized tests.",
            threads
        ),
        "أسرع بكتير بس بيعمل ضجة.. الـ WAF هيحس بيك",
    )
}

fn api_scan() -> Response {
    Response::lines([
        "Gobuster v3.6  (API endpoint enumeration)",
        "[+] Url: http://192.168.1.5/api",
        "",
        "===============================================================",
        "/api/users             (Status: 200) [Size: 4821]  <- USER DATA",
        "/api/users/1           (Status: 200) [Size: 312]   <- admin profile",
        "/api/admin             (Status: 403)",
        "/api/config            (Status: 200) [Size: 891]   <- config exposed",
        "/api/debug             (Status: 200) [Size: 12043] <- debug endpoint",
        "/api/internal          (Status: 200) [Size: 2341]  <- internal API",
        "",
        "Finished: 6 API endpoints found",
        "",
        "[!] /api/users returns the full user list without auth!",
    ])
    .with_note(
        "An unauthenticated /api/users is Broken Object Level Authorization, the top entry in \
         the OWASP API list. Debug endpoints leak stack traces and queries.",
        "/api/users بدون auth = BOLA vulnerability",
    )
}

fn backup_scan() -> Response {
    Response::lines([
        "Gobuster v3.6  (hunting backup and config files)",
        "[+] Extensions: bak,old,zip,sql",
        "",
        "===============================================================",
        "/database.sql          (Status: 200) [Size: 845230]  <- FULL DB DUMP",
        "/config.old            (Status: 200) [Size: 2401]    <- old config",
        "/backup.zip            (Status: 200) [Size: 1024000] <- source code",
        "/wp-config.bak         (Status: 200) [Size: 3012]    <- DB creds",
        "",
        "Finished: 4 backup files found",
        "",
        "[!] CRITICAL: database.sql is publicly downloadable",
        "[!] wp-config.bak holds DB_USER and DB_PASSWORD in plaintext",
    ])
    .with_note(
        "A database dump in the web root is one of the worst finds in a pentest. Backup copies \
         of config files are served as plain text because the server no longer runs them as PHP.",
        "database.sql على الويب! أحياناً الـ devs بينسوا يمسحوه",
    )
}

fn stealth_scan() -> Response {
    Response::lines([
        "Gobuster v3.6  (stealth: 200ms delay between requests)",
        "",
        "[*] Slow scan mode enabled. This will take longer.",
        "",
        "/images               (Status: 301)",
        "/uploads              (Status: 301)",
        "/admin                (Status: 403)",
        "/backup               (Status: 301)",
        "/phpmyadmin           (Status: 200)",
        "",
        "Finished in 47.3 seconds (vs 0.89s without delay)",
        "",
        "[!] Slow but much less likely to trigger WAF/rate-limit",
    ])
    .with_note(
        "WAFs count requests per second from one address. A delay spreads the scan out so it \
         looks closer to normal browsing.",
        "الـ delay بيخليك تبان زي بني آدم عادي بيتصفح",
    )
}

fn report_scan() -> Response {
    Response::lines([
        "Gobuster v3.6  (output saved to file)",
        "",
        "[+] Output file: /tmp/gobuster-report.txt",
        "",
        "===============================================================",
        "/images               (Status: 301)",
        "/uploads              (Status: 301)",
        "/admin                (Status: 403)",
        "/backup               (Status: 301)",
        "/phpmyadmin           (Status: 200)",
        "",
        "Finished. Writing results to /tmp/gobuster-report.txt...",
        "[+] Results saved: 5 findings written",
    ])
    .with_note(
        "Professional engagements need evidence. Save the output of every tool you run.",
        "البنتستر المحترف بيحفظ كل حاجة",
    )
}

fn other_host(cmd: &Command) -> Response {
    let url = cmd.value_after("-u").unwrap_or(TARGET_URL);
    Response::lines([
        "Gobuster v3.6".to_string(),
        format!("Running scan against {}...", url),
        String::new(),
        format!("[*] Hint: try the target at {}", TARGET_URL),
        "[*] Type 'help' to see all available commands".to_string(),
    ])
}

fn curl(cmd: &Command) -> Response {
    if cmd.has_flag_ignore_case("-i") {
        return Response::lines([
            "HTTP/1.1 200 OK",
            "Server: Apache/2.4.38 (Debian)",
            "X-Powered-By: PHP/7.4.3",
            "Content-Type: text/html; charset=UTF-8",
            "",
            "[!] X-Powered-By leaks the PHP version",
        ])
        .with_note_en("Headers alone often give away the server and language versions.");
    }
    Response::lines([
        "<!DOCTYPE html>",
        "<html>",
        "  <head><title>EvilCorp Intranet</title></head>",
        "  <body>",
        "    <h1>Welcome to EvilCorp Intranet</h1>",
        "    <!-- TODO: remove debug endpoint before go-live -->",
        "    <!-- /api/debug is accessible at /api/debug -->",
        "  </body>",
        "</html>",
        "",
        "[!] HTML comment leaks /api/debug endpoint!",
    ])
    .with_note(
        "Developers leave comments in production HTML that point at hidden paths. Always read \
         the page source.",
        "Comments في الـ HTML مرئية للكل",
    )
}

fn history() -> Response {
    Response::lines([
        "    1  gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt",
        "    2  gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/common.txt -x php,html,txt",
        "    3  gobuster dir -u http://192.168.1.5 -w /usr/share/wordlists/admin-paths.txt",
        "    4  gobuster dns -d evilcorp.com -w /usr/share/wordlists/subdomains.txt",
        "    5  history",
    ])
}
