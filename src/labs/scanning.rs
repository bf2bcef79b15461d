//! Lab 02: active network and port scanning with nmap.

use super::{clear_rule, Difficulty, Lab, LabError, LabMeta};
use crate::console::rules::predicates::*;
use crate::console::{Command, Predicate, Response, Rule};
use crate::missions::Step;

pub(super) const META: LabMeta = LabMeta {
    id: 2,
    slug: "lab02",
    title: "El-Tafteesh",
    subtitle: "Network & Port Scanning with Nmap",
    description: "Perform active scanning on a target host to identify open ports and running \
                  services: the next step after passive recon.",
    difficulty: Difficulty::Intermediate,
    points: 150,
    total_steps: 10,
    cwd: "~/scanning",
};

const TARGET_IP: &str = "192.168.1.5";
const DEFAULT_PORTS: &str = "22,80,3306,8080";

const VOCABULARY: &[&str] = &[
    "help", "nmap", "ping", "netstat", "ip", "ifconfig", "clear", "history",
];

pub(super) fn build() -> Result<Lab, LabError> {
    Lab::assemble(META.id, rules(), steps(), VOCABULARY)
}

/// An nmap invocation aimed at the lab host. No positional argument means
/// the lab host as well.
fn at_target() -> Predicate {
    cmd("nmap").and(any(vec![arg(TARGET_IP), no_args()]))
}

/// Step predicates compare flags case-insensitively and look for the target
/// anywhere in the line.
fn nmap_step(pred: Predicate) -> Predicate {
    cmd("nmap").and(contains(TARGET_IP)).and(pred)
}

fn steps() -> Vec<Step> {
    vec![
        Step::on_command(1, equals("nmap 192.168.1.5"))
            .title("Basic Port Scan")
            .objective("Run the default Nmap scan against the target. Discover all open TCP ports.")
            .hint("nmap 192.168.1.5")
            .solution("nmap 192.168.1.5"),
        Step::on_command(2, nmap_step(flag_ci("-sV")))
            .title("Version Detection")
            .objective("Use the -sV flag to identify exact software versions on each open port.")
            .hint("nmap -sV 192.168.1.5")
            .solution("nmap -sV 192.168.1.5"),
        Step::on_command(3, nmap_step(flag_ci("-p").and_not(contains("-p-"))))
            .title("Targeted Port Scan")
            .objective("Scan only specific ports of interest: SSH, HTTP, MySQL and alternate HTTP.")
            .hint("nmap -p 22,80,3306,8080 192.168.1.5")
            .solution("nmap -p 22,80,3306,8080 192.168.1.5"),
        Step::on_command(4, nmap_step(flag_ci("-O")))
            .title("OS Fingerprinting")
            .objective("Identify the operating system of the target host using the -O flag.")
            .hint("nmap -O 192.168.1.5")
            .solution("nmap -O 192.168.1.5"),
        Step::on_command(5, nmap_step(flag_ci("-A").and_not(flag_ci("-T4"))))
            .title("Aggressive All-In-One Scan")
            .objective("Run the aggressive scan mode: versions, OS, scripts and traceroute at once.")
            .hint("nmap -A 192.168.1.5")
            .solution("nmap -A 192.168.1.5"),
        Step::on_command(6, nmap_step(contains("-p-")))
            .title("Full Port Scan")
            .objective("Scan ALL 65535 TCP ports. The default scan only covers 1000.")
            .hint("nmap -p- 192.168.1.5")
            .solution("nmap -p- 192.168.1.5"),
        Step::on_command(7, nmap_step(flag_ci("-sU")))
            .title("UDP Port Scan")
            .objective("Run a UDP scan to discover services like DNS, SNMP and NTP.")
            .hint("nmap -sU 192.168.1.5")
            .solution("nmap -sU 192.168.1.5"),
        Step::on_command(8, nmap_step(flag_ci("-T4").and(flag_ci("-F"))))
            .title("Fast Scan with Timing")
            .objective("Use T4 timing with -F to scan the top 100 ports in under a second.")
            .hint("nmap -T4 -F 192.168.1.5")
            .solution("nmap -T4 -F 192.168.1.5"),
        Step::on_command(9, nmap_step(contains("--script").and(contains("vuln"))))
            .title("NSE Vulnerability Scan")
            .objective("Run the scripting engine's vuln category to auto-detect known CVEs.")
            .hint("nmap --script vuln 192.168.1.5")
            .solution("nmap --script vuln 192.168.1.5"),
        Step::on_command(
            10,
            cmd("nmap")
                .and(flag_ci("-sn"))
                .and(any(vec![contains("192.168.1.0"), contains("/24")])),
        )
        .title("Network Host Discovery")
        .objective("Sweep the entire /24 subnet to find all live hosts without scanning ports.")
        .hint("nmap -sn 192.168.1.0/24")
        .solution("nmap -sn 192.168.1.0/24"),
    ]
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::fixed("help", cmd("help"), help()).example("help"),
        Rule::fixed("nmap-version", at_target().and(flag("-sV")), version_scan())
            .example("nmap -sV 192.168.1.5"),
        Rule::fixed("nmap-default", at_target().and(no_flags()), default_scan())
            .example("nmap 192.168.1.5"),
        Rule::render("nmap-ports", at_target().and(flag("-p")), port_scan)
            .example("nmap -p 22,80 192.168.1.5"),
        Rule::fixed("nmap-os", at_target().and(flag("-O")), os_scan()).example("nmap -O 192.168.1.5"),
        Rule::fixed("nmap-aggressive", at_target().and(flag("-A")), aggressive_scan())
            .example("nmap -A 192.168.1.5"),
        Rule::fixed("nmap-udp", at_target().and(flag("-sU")), udp_scan())
            .example("nmap -sU 192.168.1.5"),
        Rule::fixed("nmap-ping-sweep", cmd("nmap").and(flag("-sn")), ping_sweep())
            .example("nmap -sn 192.168.1.0/24"),
        Rule::fixed(
            "nmap-vuln",
            cmd("nmap").and(flag("--script")).and(arg("vuln")).and(arg(TARGET_IP)),
            vuln_scan(),
        )
        .example("nmap --script vuln 192.168.1.5"),
        Rule::fixed("nmap-full", at_target().and(flag("-p-")), full_scan())
            .example("nmap -p- 192.168.1.5"),
        Rule::fixed(
            "nmap-fast",
            at_target().and(flag_ci("-T4")).and(flag_ci("-F")),
            fast_scan(),
        )
        .example("nmap -T4 -F 192.168.1.5"),
        Rule::render("nmap-other", cmd("nmap"), other_host).example("nmap 10.0.0.7"),
        Rule::render("ping", cmd("ping"), ping).example("ping 192.168.1.5"),
        Rule::render("netstat", cmd("netstat"), netstat).example("netstat -tuln"),
        Rule::fixed(
            "ip-addr",
            cmd("ip").and(arg("addr")),
            Response::lines([
                "1: lo: <LOOPBACK,UP>",
                "   inet 127.0.0.1/8",
                "2: eth0: <BROADCAST,MULTICAST,UP>",
                "   inet 192.168.1.105/24 brd 192.168.1.255",
                "",
                "[!] Your IP: 192.168.1.105, same subnet as target 192.168.1.5",
            ])
            .with_note(
                "You and the target share the 192.168.1.0/24 subnet, so traffic goes directly \
                 with no routing hops in between.",
                "إنت والـ target في نفس الـ subnet.. يعني مفيش router بينكم",
            ),
        )
        .example("ip addr"),
        Rule::fixed("ip-usage", cmd("ip"), Response::lines(["Usage: ip addr"])).example("ip a"),
        Rule::fixed(
            "ifconfig",
            cmd("ifconfig"),
            Response::lines([
                "eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>",
                "      inet 192.168.1.105  netmask 255.255.255.0  broadcast 192.168.1.255",
                "",
                "lo:   flags=73<UP,LOOPBACK,RUNNING>",
                "      inet 127.0.0.1  netmask 255.0.0.0",
            ])
            .with_note_en("Same-subnet scans can use ARP, which is faster than routed scans."),
        )
        .example("ifconfig"),
        Rule::fixed(
            "history",
            cmd("history"),
            Response::lines([
                "    1  ping 192.168.1.5",
                "    2  nmap 192.168.1.5",
                "    3  nmap -sV 192.168.1.5",
                "    4  nmap -p 22,80,3306,8080 192.168.1.5",
                "    5  nmap -O 192.168.1.5",
                "    6  nmap -A 192.168.1.5",
                "    7  history",
            ])
            .with_note(
                "Methodical progression: discovery, basic scan, versions, targeted ports, OS, \
                 and only then the loud aggressive scan.",
                "البنتستر المحترف بيمشي خطوة خطوة.. مش بيقفز على -A من الأول",
            ),
        )
        .example("history"),
        clear_rule(),
    ]
}

fn help() -> Response {
    Response::lines([
        "Cyber-Masry Scanning Toolkit  -  Help Menu",
        "[SIMULATED ENVIRONMENT - EDUCATIONAL USE ONLY]",
        "",
        "  nmap <ip>                    Default TCP SYN scan",
        "  nmap -sV <ip>                Version detection",
        "  nmap -p <ports> <ip>         Scan specific ports",
        "  nmap -O <ip>                 OS fingerprinting",
        "  nmap -A <ip>                 Aggressive (all-in-one)",
        "  nmap -sU <ip>                UDP scan",
        "  nmap -sn <network>           Ping sweep (host discovery)",
        "  nmap --script vuln <ip>      Run vulnerability scripts",
        "  ping <ip>                    ICMP host check",
        "  netstat -tuln                Local open ports",
        "  ip addr                      Network interfaces",
        "  clear                        Clear terminal",
        "",
        "  Mission target: 192.168.1.5",
        "  Start with:  nmap 192.168.1.5",
    ])
}

fn default_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( https://nmap.org )",
        "Nmap scan report for 192.168.1.5",
        "Host is up (0.0036s latency).",
        "Not shown: 996 closed tcp ports (reset)",
        "",
        "PORT      STATE    SERVICE",
        "22/tcp    open     ssh",
        "80/tcp    open     http",
        "443/tcp   closed   https",
        "3306/tcp  open     mysql",
        "",
        "Nmap done: 1 IP address (1 host up) scanned in 2.87 seconds",
        "",
        "[!] 3 open ports found: 22 (SSH), 80 (HTTP), 3306 (MySQL)",
    ])
    .with_note(
        "A SYN scan sends a TCP SYN and waits for SYN-ACK. \"Closed\" means the host replied \
         with RST, \"filtered\" means a firewall dropped the packet. MySQL on 3306 should never \
         be exposed like this.",
        "MySQL بيبان على الإنترنت؟ ده خطأ فادح! قاعدة البيانات لازم تبقى ورا firewall",
    )
}

fn version_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( version detection mode )",
        "Nmap scan report for 192.168.1.5",
        "Host is up (0.0041s latency).",
        "",
        "PORT      STATE  SERVICE  VERSION",
        "22/tcp    open   ssh      OpenSSH 7.9p1 Debian 10+deb10u2 (protocol 2.0)",
        "80/tcp    open   http     Apache httpd 2.4.38 ((Debian))",
        "3306/tcp  open   mysql    MySQL 5.7.32-log",
        "",
        "Service Info: OS: Linux; CPE: cpe:/o:linux:linux_kernel",
        "",
        "[!] OpenSSH 7.9: check for known CVEs",
        "[!] Apache 2.4.38: outdated, CVE-2019-0211 exists",
        "[!] MySQL 5.7.32: end-of-life, unpatched vulnerabilities",
    ])
    .with_note(
        "Version detection sends service-specific probes to identify exact software versions. \
         Apache 2.4.38 has a known privilege escalation (CVE-2019-0211).",
        "Apache 2.4.38 عندها CVE معروف للـ privilege escalation",
    )
}

fn port_state(port: &str) -> (&'static str, &'static str) {
    match port {
        "22" => ("open", "ssh"),
        "80" => ("open", "http"),
        "443" => ("closed", "https"),
        "3306" => ("open", "mysql"),
        "8080" => ("filtered", "http-alt"),
        "8443" => ("filtered", "https-alt"),
        "21" => ("closed", "ftp"),
        "25" => ("filtered", "smtp"),
        _ => ("closed", "unknown"),
    }
}

fn port_scan(cmd: &Command) -> Response {
    let ports = cmd.value_after("-p").unwrap_or(DEFAULT_PORTS);
    let mut lines = vec![
        "Starting Nmap 7.94 ( scanning specific ports )".to_string(),
        format!("Nmap scan report for {}", TARGET_IP),
        "Host is up.".to_string(),
        String::new(),
        "PORT      STATE     SERVICE".to_string(),
    ];
    for port in ports.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (state, service) = port_state(port);
        lines.push(format!("{:<10}{:<10}{}", format!("{}/tcp", port), state, service));
    }
    lines.extend([
        String::new(),
        "Nmap done: 1 IP address (1 host up) scanned in 1.42 seconds".to_string(),
        String::new(),
        "[!] Port 8080 filtered: possible internal admin panel behind a firewall".to_string(),
    ]);
    Response::lines(lines).with_note(
        "Scanning specific ports is faster and stealthier than a full scan. Filtered means a \
         firewall is blocking the port, so the service may still be there.",
        "port 8080 filtered يعني فيه حاجة ورا الـ firewall",
    )
}

fn os_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( OS detection mode, requires root )",
        "Nmap scan report for 192.168.1.5",
        "",
        "Device type: general purpose",
        "Running: Linux 4.X|5.X",
        "OS CPE: cpe:/o:linux:linux_kernel:4  cpe:/o:linux:linux_kernel:5",
        "OS details: Linux 4.15 - 5.6",
        "Network Distance: 1 hop",
        "",
        "[!] Linux kernel 4-5 detected: check kernel vulnerabilities",
    ])
    .with_note(
        "OS detection compares TCP/IP stack quirks like TTL, window size and option ordering. \
         Knowing the OS lets an attacker pick OS-specific exploits.",
        "معرفة الـ OS = اختيار الـ exploit الصح",
    )
}

fn aggressive_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( AGGRESSIVE SCAN: -sV -O -sC --traceroute )",
        "Nmap scan report for 192.168.1.5",
        "",
        "PORT      STATE  SERVICE  VERSION",
        "22/tcp    open   ssh      OpenSSH 7.9p1 Debian",
        "80/tcp    open   http     Apache 2.4.38 (Debian)",
        "| http-title: EvilCorp Intranet Portal",
        "3306/tcp  open   mysql    MySQL 5.7.32",
        "|_  Status: Autocommit",
        "",
        "OS details: Linux 4.15 - 5.6",
        "",
        "[!] CRITICAL: Page title \"EvilCorp Intranet Portal\" is public-facing!",
        "[!] -A scan leaves heavy logs. Use in authorized engagements only!",
    ])
    .with_note(
        "-A combines version detection, OS detection, default scripts and traceroute. It is \
         very loud and will almost certainly trigger IDS alerts.",
        "-A ده السلاح النووي بتاع Nmap.. بس بيعمل ضجة كبيرة",
    )
}

fn udp_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( UDP scan, slow, requires root )",
        "",
        "PORT     STATE          SERVICE",
        "53/udp   open           domain (DNS)",
        "123/udp  open           ntp",
        "161/udp  open|filtered  snmp",
        "",
        "[!] SNMP 161/udp: often left with default community string \"public\"",
    ])
    .with_note(
        "UDP ports are often overlooked. SNMP with the default community string lets anyone \
         enumerate the device config.",
        "SNMP بـ \"public\" ده زي ما تسيب باب مفتوح",
    )
}

fn ping_sweep() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( Ping sweep, no port scan )",
        "Scanning 192.168.1.0/24 (256 hosts)...",
        "",
        "Nmap scan report for 192.168.1.1   [router]        Host is up",
        "Nmap scan report for 192.168.1.5   [target]        Host is up",
        "Nmap scan report for 192.168.1.10  [printer]       Host is up",
        "Nmap scan report for 192.168.1.20  [workstation]   Host is up",
        "Nmap scan report for 192.168.1.105 [your machine]  Host is up",
        "",
        "Nmap done: 256 IP addresses, 5 hosts up, scanned in 4.21 seconds",
    ])
    .with_note(
        "A ping sweep discovers live hosts without scanning ports. Map the network before \
         choosing targets.",
        "الـ ping sweep زي أشعة X للشبكة",
    )
}

fn vuln_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( NSE vulnerability scan )",
        "Nmap scan report for 192.168.1.5",
        "",
        "80/tcp   open  http",
        "| http-vuln-cve2017-5638:",
        "|   VULNERABLE: Apache Struts RCE CVE-2017-5638",
        "|   State: LIKELY VULNERABLE (not confirmed)",
        "3306/tcp open  mysql",
        "| mysql-empty-password:",
        "|_  WARNING: No password on MySQL root account",
        "",
        "[!] CRITICAL: MySQL root with NO password!",
    ])
    .with_note(
        "NSE scripts test for known vulnerabilities and default credentials. CVE-2017-5638 is \
         the Struts bug behind the Equifax breach.",
        "MySQL بدون password على الـ root = كارثة!",
    )
}

fn full_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( FULL PORT SCAN: all 65535 ports )",
        "Nmap scan report for 192.168.1.5",
        "",
        "PORT       STATE     SERVICE",
        "22/tcp     open      ssh",
        "80/tcp     open      http",
        "1099/tcp   open      rmiregistry",
        "3306/tcp   open      mysql",
        "5432/tcp   open      postgresql",
        "8009/tcp   open      ajp13",
        "8080/tcp   open      http-alt",
        "",
        "[!] 3 NEW ports found vs. default scan: 1099, 5432, 8009",
        "[!] AJP 8009: CVE-2020-1938 (Ghostcat) reads any file on the server",
    ])
    .with_note(
        "The default scan only checks the top 1000 ports. -p- checks all 65535 and found three \
         services the default missed.",
        "الـ default scan بيفوّت 64535 port!",
    )
}

fn fast_scan() -> Response {
    Response::lines([
        "Starting Nmap 7.94 ( FAST SCAN: T4 timing + top 100 ports )",
        "Nmap scan report for 192.168.1.5",
        "",
        "PORT     STATE  SERVICE",
        "22/tcp   open   ssh",
        "80/tcp   open   http",
        "3306/tcp open   mysql",
        "",
        "Nmap done: 1 IP address, 100 ports scanned in 0.41 seconds",
        "[!] Trade-off: speed vs. coverage. Missing ports 1099, 5432, 8009!",
    ])
    .with_note(
        "Timing templates run from T0 (paranoid) to T5 (insane). T4 with -F is a quick snapshot; \
         use -p- when thoroughness matters.",
        "T4 هو الـ sweet spot",
    )
}

fn other_host(cmd: &Command) -> Response {
    let host = cmd.target().unwrap_or(TARGET_IP);
    Response::lines([
        "Starting Nmap 7.94...".to_string(),
        format!("Nmap scan report for {}", host),
        "Host is up.".to_string(),
        format!("Note: No open ports found on {}.", host),
        String::new(),
        format!("[!] Hint: scan our target at {}", TARGET_IP),
    ])
}

fn ping(cmd: &Command) -> Response {
    let host = cmd.target().unwrap_or(TARGET_IP);
    Response::lines([
        format!("PING {} ({}) 56(84) bytes of data.", host, host),
        format!("64 bytes from {}: icmp_seq=1 ttl=64 time=0.42 ms", host),
        format!("64 bytes from {}: icmp_seq=2 ttl=64 time=0.38 ms", host),
        String::new(),
        format!("--- {} ping statistics ---", host),
        "2 packets transmitted, 2 received, 0% packet loss".to_string(),
        String::new(),
        "[!] TTL=64 -> Linux host confirmed".to_string(),
    ])
    .with_note(
        "Confirm the host is alive before scanning. A failed ping may only mean ICMP is blocked.",
        "لو ping فشل مش معناه الهوست وقع",
    )
}

fn netstat(cmd: &Command) -> Response {
    let listening = cmd
        .flags
        .iter()
        .any(|f| f.contains('t') || f.contains('u') || f.contains('l'));
    if !listening {
        return Response::lines(["Try: netstat -tuln   (show listening TCP/UDP ports)"]);
    }
    Response::lines([
        "Active Internet connections (only servers)",
        "Proto  Local Address        State",
        "tcp    0.0.0.0:22           LISTEN   (SSH)",
        "tcp    0.0.0.0:80           LISTEN   (HTTP -> Apache)",
        "tcp    0.0.0.0:3306         LISTEN   (MySQL <- DANGER)",
        "tcp    127.0.0.1:6379       LISTEN   (Redis, localhost only)",
        "",
        "[!] MySQL exposed on 0.0.0.0 = reachable from any IP",
    ])
    .with_note(
        "Binding to 0.0.0.0 accepts connections from any IP, which is why MySQL here is dangerous.",
        "0.0.0.0 يعني \"اقبل من أي حد\"",
    )
}
